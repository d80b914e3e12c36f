//! Type-level comparison

use std::collections::{BTreeMap, BTreeSet};

use super::{AnalysisWarning, ChangeCategory, ChangeCollector, CompatibilityChange, Severity};
use crate::error::AnalysisError;
use crate::reference::ReferenceIndex;
use crate::schema::{CanonicalSchema, PropertyDefinition, TypeDefinition, TypeKind};

/// Compare type definitions keyed by id.
///
/// `index` is the reverse reference index of the source schema; it supplies
/// the affected components of removed types.
pub fn compare_types(
    source: &CanonicalSchema,
    target: &CanonicalSchema,
    index: &ReferenceIndex,
    out: &mut ChangeCollector<'_>,
) {
    let source_types: BTreeMap<&str, &TypeDefinition> =
        source.types.iter().map(|t| (t.id.as_str(), t)).collect();
    let target_types: BTreeMap<&str, &TypeDefinition> =
        target.types.iter().map(|t| (t.id.as_str(), t)).collect();

    for (id, old) in &source_types {
        let path = format!("types.{}", id);
        if !out.enter(&path) {
            continue;
        }
        match target_types.get(id) {
            None => type_removed(old, &path, index, out),
            Some(new) => compare_type(old, new, &path, out),
        }
    }

    for (id, new) in &target_types {
        let path = format!("types.{}", id);
        if source_types.contains_key(id) || !out.enter(&path) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::TypeAdded,
                Severity::NonBreaking,
                path,
                format!("Type '{}' was added", id),
            )
            .complexity(1)
            .target(&new.kind),
        );
    }
}

fn type_removed(
    old: &TypeDefinition,
    path: &str,
    index: &ReferenceIndex,
    out: &mut ChangeCollector<'_>,
) {
    let trace = index.impact_of(&old.id);
    if trace.cycle_detected {
        let err = AnalysisError::CircularReference {
            type_id: old.id.clone(),
        };
        out.warn(AnalysisWarning::from_error(&err, Some(path.to_string())));
    }

    let mut components = trace.paths();
    if components.is_empty() {
        components.push(path.to_string());
    }

    out.push(
        CompatibilityChange::new(
            ChangeCategory::TypeRemoved,
            Severity::Breaking,
            path,
            format!(
                "Type '{}' was removed ({} referencing locations)",
                old.id,
                trace.locations.len()
            ),
        )
        .complexity(4)
        .source(&old.kind)
        .components(components),
    );
}

fn compare_type(
    old: &TypeDefinition,
    new: &TypeDefinition,
    path: &str,
    out: &mut ChangeCollector<'_>,
) {
    if old.description != new.description {
        out.push(
            CompatibilityChange::new(
                ChangeCategory::DocumentationChanged,
                Severity::Patch,
                format!("{}.description", path),
                format!("Description of type '{}' changed", old.id),
            )
            .source(&old.description)
            .target(&new.description),
        );
    }

    match (&old.kind, &new.kind) {
        (TypeKind::Primitive { format: a }, TypeKind::Primitive { format: b }) => {
            if a != b {
                out.push(
                    modified(old, path, format!("Primitive format changed from '{}' to '{}'", a, b))
                        .complexity(3)
                        .source(a)
                        .target(b),
                );
            }
        }
        (TypeKind::Object { properties: a }, TypeKind::Object { properties: b }) => {
            compare_properties(a, b, path, out);
        }
        (TypeKind::Array { items: a }, TypeKind::Array { items: b }) => {
            if a != b {
                out.push(
                    modified(old, path, format!("Array item type changed from '{}' to '{}'", a, b))
                        .complexity(4)
                        .source(a)
                        .target(b),
                );
            }
        }
        (TypeKind::Union { members: a }, TypeKind::Union { members: b }) => {
            compare_sets(
                a,
                b,
                &format!("{}.variants", path),
                (ChangeCategory::UnionVariantRemoved, ChangeCategory::UnionVariantAdded),
                "Union variant",
                out,
            );
        }
        (TypeKind::Enum { values: a }, TypeKind::Enum { values: b }) => {
            compare_sets(
                a,
                b,
                &format!("{}.values", path),
                (ChangeCategory::EnumValueRemoved, ChangeCategory::EnumValueAdded),
                "Enum value",
                out,
            );
        }
        (TypeKind::Reference { target: a }, TypeKind::Reference { target: b }) => {
            if a != b {
                out.push(
                    modified(old, path, format!("Alias target changed from '{}' to '{}'", a, b))
                        .complexity(4)
                        .source(a)
                        .target(b),
                );
            }
        }
        // Listing every variant keeps this match exhaustive when a kind is added.
        (
            TypeKind::Primitive { .. }
            | TypeKind::Object { .. }
            | TypeKind::Array { .. }
            | TypeKind::Union { .. }
            | TypeKind::Enum { .. }
            | TypeKind::Reference { .. },
            _,
        ) => {
            let (from, to) = (old.kind.tag(), new.kind.tag());
            out.push(
                modified(old, path, format!("Kind changed from {} to {}", from, to))
                    .complexity(5)
                    .source(from)
                    .target(to),
            );
        }
    }
}

fn modified(old: &TypeDefinition, path: &str, detail: String) -> CompatibilityChange {
    CompatibilityChange::new(
        ChangeCategory::TypeModified,
        Severity::Breaking,
        path,
        format!("Type '{}': {}", old.id, detail),
    )
}

fn compare_properties(
    old: &[PropertyDefinition],
    new: &[PropertyDefinition],
    type_path: &str,
    out: &mut ChangeCollector<'_>,
) {
    let old_props: BTreeMap<&str, &PropertyDefinition> =
        old.iter().map(|p| (p.name.as_str(), p)).collect();
    let new_props: BTreeMap<&str, &PropertyDefinition> =
        new.iter().map(|p| (p.name.as_str(), p)).collect();

    for (name, prop) in &old_props {
        let path = format!("{}.properties.{}", type_path, name);
        let Some(current) = new_props.get(name) else {
            out.push(
                CompatibilityChange::new(
                    ChangeCategory::PropertyRemoved,
                    Severity::breaking_if(prop.required),
                    &path,
                    if prop.required {
                        format!("Required property '{}' was removed", name)
                    } else {
                        format!("Optional property '{}' was removed", name)
                    },
                )
                .complexity(if prop.required { 3 } else { 2 })
                .source(prop),
            );
            continue;
        };

        if prop.type_ref != current.type_ref {
            out.push(
                CompatibilityChange::new(
                    ChangeCategory::PropertyTypeChanged,
                    Severity::Breaking,
                    &path,
                    format!(
                        "Property '{}' type changed from '{}' to '{}'",
                        name, prop.type_ref, current.type_ref
                    ),
                )
                .complexity(4)
                .source(&prop.type_ref)
                .target(&current.type_ref),
            );
        }

        if prop.required != current.required {
            let tightened = current.required;
            out.push(
                CompatibilityChange::new(
                    ChangeCategory::PropertyRequirementChanged,
                    Severity::breaking_if(tightened),
                    &path,
                    if tightened {
                        format!("Property '{}' changed from optional to required", name)
                    } else {
                        format!("Property '{}' changed from required to optional", name)
                    },
                )
                .complexity(if tightened { 3 } else { 1 })
                .source(prop.required)
                .target(current.required),
            );
        }
    }

    for (name, prop) in &new_props {
        if old_props.contains_key(name) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::PropertyAdded,
                Severity::breaking_if(prop.required),
                format!("{}.properties.{}", type_path, name),
                if prop.required {
                    format!("Required property '{}' was added", name)
                } else {
                    format!("Optional property '{}' was added", name)
                },
            )
            .complexity(if prop.required { 3 } else { 1 })
            .target(prop),
        );
    }
}

/// Set diff shared by enum values and union variants: removal breaks, addition never does
fn compare_sets(
    old: &[String],
    new: &[String],
    base: &str,
    (removed, added): (ChangeCategory, ChangeCategory),
    label: &str,
    out: &mut ChangeCollector<'_>,
) {
    let old_set: BTreeSet<&String> = old.iter().collect();
    let new_set: BTreeSet<&String> = new.iter().collect();

    for value in old_set.difference(&new_set) {
        out.push(
            CompatibilityChange::new(
                removed,
                Severity::Breaking,
                format!("{}.{}", base, value),
                format!("{} '{}' was removed", label, value),
            )
            .complexity(3)
            .source(value),
        );
    }

    for value in new_set.difference(&old_set) {
        out.push(
            CompatibilityChange::new(
                added,
                Severity::NonBreaking,
                format!("{}.{}", base, value),
                format!("{} '{}' was added", label, value),
            )
            .complexity(1)
            .target(value),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::IgnoreRules;
    use serde_json::json;

    fn schema(types: serde_json::Value) -> CanonicalSchema {
        serde_json::from_value(json!({
            "providerId": "acme",
            "version": "1.0.0",
            "types": types
        }))
        .unwrap()
    }

    fn diff(source: &CanonicalSchema, target: &CanonicalSchema) -> Vec<CompatibilityChange> {
        let rules = IgnoreRules::default();
        let mut out = ChangeCollector::new(&rules, &[]);
        compare_types(source, target, &ReferenceIndex::build(source), &mut out);
        out.finish().0
    }

    fn user(props: serde_json::Value) -> CanonicalSchema {
        schema(json!([
            {"id": "string", "kind": "primitive", "format": "string"},
            {"id": "User", "kind": "object", "properties": props}
        ]))
    }

    #[test]
    fn test_optional_property_removal_is_not_breaking() {
        let old = user(json!([{"name": "bio", "typeRef": "string"}]));
        let new = user(json!([]));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category, ChangeCategory::PropertyRemoved);
        assert_eq!(changes[0].severity, Severity::NonBreaking);
    }

    #[test]
    fn test_required_property_addition_is_breaking() {
        let old = user(json!([]));
        let new = user(json!([{"name": "email", "typeRef": "string", "required": true}]));
        let changes = diff(&old, &new);
        assert_eq!(changes[0].category, ChangeCategory::PropertyAdded);
        assert!(changes[0].is_breaking());
    }

    #[test]
    fn test_requirement_toggle_direction() {
        let optional = user(json!([{"name": "email", "typeRef": "string"}]));
        let required = user(json!([{"name": "email", "typeRef": "string", "required": true}]));

        let tightened = diff(&optional, &required);
        assert_eq!(tightened[0].category, ChangeCategory::PropertyRequirementChanged);
        assert_eq!(tightened[0].severity, Severity::Breaking);

        let relaxed = diff(&required, &optional);
        assert_eq!(relaxed[0].severity, Severity::NonBreaking);
    }

    #[test]
    fn test_property_type_change_is_breaking() {
        let old = user(json!([{"name": "age", "typeRef": "string"}]));
        let mut new = user(json!([{"name": "age", "typeRef": "int"}]));
        new.types.push(TypeDefinition {
            id: "int".to_string(),
            description: None,
            kind: TypeKind::Primitive { format: "integer".to_string() },
        });
        let changes: Vec<_> = diff(&old, &new)
            .into_iter()
            .filter(|c| c.category == ChangeCategory::PropertyTypeChanged)
            .collect();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_breaking());
    }

    #[test]
    fn test_kind_change_is_breaking_both_ways() {
        let as_enum = schema(json!([{"id": "Status", "kind": "enum", "values": ["a"]}]));
        let as_prim = schema(json!([{"id": "Status", "kind": "primitive", "format": "string"}]));
        for (a, b) in [(&as_enum, &as_prim), (&as_prim, &as_enum)] {
            let changes = diff(a, b);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].category, ChangeCategory::TypeModified);
            assert_eq!(changes[0].impact.migration_complexity, 5);
        }
    }

    #[test]
    fn test_enum_values() {
        let old = schema(json!([{"id": "Role", "kind": "enum", "values": ["admin", "member"]}]));
        let new = schema(json!([{"id": "Role", "kind": "enum", "values": ["member", "guest"]}]));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 2);
        let removed = changes.iter().find(|c| c.category == ChangeCategory::EnumValueRemoved).unwrap();
        assert_eq!(removed.path, "types.Role.values.admin");
        assert!(removed.is_breaking());
        let added = changes.iter().find(|c| c.category == ChangeCategory::EnumValueAdded).unwrap();
        assert_eq!(added.severity, Severity::NonBreaking);
    }

    #[test]
    fn test_union_variants() {
        let old = schema(json!([{"id": "Pet", "kind": "union", "members": ["Cat", "Dog"]}]));
        let new = schema(json!([{"id": "Pet", "kind": "union", "members": ["Cat", "Bird"]}]));
        let changes = diff(&old, &new);
        assert!(changes
            .iter()
            .any(|c| c.category == ChangeCategory::UnionVariantRemoved && c.is_breaking()));
        assert!(changes
            .iter()
            .any(|c| c.category == ChangeCategory::UnionVariantAdded && !c.is_breaking()));
    }

    #[test]
    fn test_removed_type_reports_referencing_locations() {
        let old = schema(json!([
            {"id": "Address", "kind": "object", "properties": []},
            {"id": "User", "kind": "object", "properties": [
                {"name": "home", "typeRef": "Address"}
            ]}
        ]));
        let new = schema(json!([
            {"id": "User", "kind": "object", "properties": [
                {"name": "home", "typeRef": "Address"}
            ]}
        ]));
        let changes = diff(&old, &new);
        let removed = changes.iter().find(|c| c.category == ChangeCategory::TypeRemoved).unwrap();
        assert_eq!(removed.impact.migration_complexity, 4);
        assert_eq!(
            removed.impact.affected_components,
            vec!["types.User.properties.home".to_string()]
        );
    }

    #[test]
    fn test_namespaced_ids_keep_their_owner() {
        let old = schema(json!([
            {"id": "acme", "kind": "object", "properties": []},
            {"id": "acme.User", "kind": "object", "properties": [
                {"name": "name", "typeRef": "string", "required": true}
            ]}
        ]));
        let new = schema(json!([
            {"id": "acme", "kind": "object", "properties": []},
            {"id": "acme.User", "kind": "object", "properties": []}
        ]));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "types.acme.User.properties.name");
        assert_eq!(changes[0].impact.affected_components, vec!["types.acme.User".to_string()]);

        let rules = IgnoreRules::new(["types.acme"]);
        let mut out = ChangeCollector::new(&rules, &[]);
        compare_types(&old, &new, &ReferenceIndex::build(&old), &mut out);
        assert_eq!(out.finish().0.len(), 1);
    }

    #[test]
    fn test_removed_recursive_type_warns() {
        let old = schema(json!([
            {"id": "Node", "kind": "object", "properties": [{"name": "next", "typeRef": "Node"}]}
        ]));
        let new = schema(json!([]));
        let rules = IgnoreRules::default();
        let mut out = ChangeCollector::new(&rules, &[]);
        compare_types(&old, &new, &ReferenceIndex::build(&old), &mut out);
        let (changes, warnings) = out.finish();
        assert_eq!(changes.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, crate::error::ErrorCode::CircularReference);
    }
}

//! Endpoint-level comparison

use std::collections::BTreeMap;

use super::{ChangeCategory, ChangeCollector, CompatibilityChange, Severity};
use crate::schema::{
    CanonicalSchema, EndpointDefinition, ParameterDefinition, ParameterLocation, RequestBody,
    ResponseDefinition,
};

/// Compare endpoints keyed by operationId
pub fn compare_endpoints(
    source: &CanonicalSchema,
    target: &CanonicalSchema,
    out: &mut ChangeCollector<'_>,
) {
    let source_ops: BTreeMap<&str, &EndpointDefinition> = source
        .endpoints
        .iter()
        .map(|e| (e.operation_id.as_str(), e))
        .collect();
    let target_ops: BTreeMap<&str, &EndpointDefinition> = target
        .endpoints
        .iter()
        .map(|e| (e.operation_id.as_str(), e))
        .collect();

    for (op, old) in &source_ops {
        let path = format!("endpoints.{}", op);
        if !out.enter(&path) {
            continue;
        }
        match target_ops.get(op) {
            None => out.push(
                CompatibilityChange::new(
                    ChangeCategory::EndpointRemoved,
                    Severity::Breaking,
                    &path,
                    format!("Endpoint {} {} ({}) was removed", old.method, old.path, op),
                )
                .complexity(5)
                .source(signature(old)),
            ),
            Some(new) => compare_endpoint(old, new, &path, out),
        }
    }

    for (op, new) in &target_ops {
        let path = format!("endpoints.{}", op);
        if source_ops.contains_key(op) || !out.enter(&path) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::EndpointAdded,
                Severity::NonBreaking,
                path,
                format!("Endpoint {} {} ({}) was added", new.method, new.path, op),
            )
            .complexity(1)
            .target(signature(new)),
        );
    }
}

fn signature(endpoint: &EndpointDefinition) -> String {
    format!("{} {}", endpoint.method.to_ascii_uppercase(), endpoint.path)
}

fn compare_endpoint(
    old: &EndpointDefinition,
    new: &EndpointDefinition,
    base: &str,
    out: &mut ChangeCollector<'_>,
) {
    if old.path != new.path {
        out.push(
            CompatibilityChange::new(
                ChangeCategory::EndpointModified,
                Severity::Breaking,
                format!("{}.path", base),
                format!(
                    "Path of '{}' changed from {} to {}",
                    old.operation_id, old.path, new.path
                ),
            )
            .complexity(4)
            .source(&old.path)
            .target(&new.path),
        );
    }

    if !old.method.eq_ignore_ascii_case(&new.method) {
        out.push(
            CompatibilityChange::new(
                ChangeCategory::EndpointModified,
                Severity::Breaking,
                format!("{}.method", base),
                format!(
                    "Method of '{}' changed from {} to {}",
                    old.operation_id,
                    old.method.to_ascii_uppercase(),
                    new.method.to_ascii_uppercase()
                ),
            )
            .complexity(3)
            .source(old.method.to_ascii_uppercase())
            .target(new.method.to_ascii_uppercase()),
        );
    }

    if !old.deprecated && new.deprecated {
        out.push(CompatibilityChange::new(
            ChangeCategory::EndpointDeprecated,
            Severity::Informational,
            format!("{}.deprecated", base),
            format!("Endpoint '{}' is now deprecated", old.operation_id),
        ));
    }

    if old.description != new.description {
        out.push(
            CompatibilityChange::new(
                ChangeCategory::DocumentationChanged,
                Severity::Patch,
                format!("{}.description", base),
                format!("Description of endpoint '{}' changed", old.operation_id),
            )
            .source(&old.description)
            .target(&new.description),
        );
    }

    compare_parameters(&old.parameters, &new.parameters, base, out);
    compare_request_body(old.request_body.as_ref(), new.request_body.as_ref(), base, out);
    compare_responses(&old.responses, &new.responses, base, out);
}

fn compare_parameters(
    old: &[ParameterDefinition],
    new: &[ParameterDefinition],
    base: &str,
    out: &mut ChangeCollector<'_>,
) {
    let key = |p: &ParameterDefinition| -> (ParameterLocation, String) { (p.location, p.name.clone()) };
    let old_params: BTreeMap<_, &ParameterDefinition> = old.iter().map(|p| (key(p), p)).collect();
    let new_params: BTreeMap<_, &ParameterDefinition> = new.iter().map(|p| (key(p), p)).collect();

    for ((location, name), param) in &old_params {
        let path = format!("{}.parameters.{}.{}", base, location, name);
        let Some(current) = new_params.get(&(*location, name.clone())) else {
            out.push(
                CompatibilityChange::new(
                    ChangeCategory::ParameterRemoved,
                    Severity::breaking_if(param.required),
                    &path,
                    format!(
                        "{} {} parameter '{}' was removed",
                        requirement(param.required),
                        location,
                        name
                    ),
                )
                .complexity(if param.required { 3 } else { 1 })
                .source(param),
            );
            continue;
        };

        if param.type_ref != current.type_ref {
            out.push(
                CompatibilityChange::new(
                    ChangeCategory::ParameterModified,
                    Severity::Breaking,
                    &path,
                    format!(
                        "Parameter '{}' type changed from '{}' to '{}'",
                        name, param.type_ref, current.type_ref
                    ),
                )
                .complexity(3)
                .source(&param.type_ref)
                .target(&current.type_ref),
            );
        }

        if param.required != current.required {
            let tightened = current.required;
            out.push(
                CompatibilityChange::new(
                    ChangeCategory::ParameterModified,
                    Severity::breaking_if(tightened),
                    &path,
                    format!(
                        "Parameter '{}' changed from {} to {}",
                        name,
                        requirement(param.required).to_lowercase(),
                        requirement(current.required).to_lowercase()
                    ),
                )
                .complexity(if tightened { 3 } else { 1 })
                .source(param.required)
                .target(current.required),
            );
        }
    }

    for ((location, name), param) in &new_params {
        if old_params.contains_key(&(*location, name.clone())) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::ParameterAdded,
                Severity::breaking_if(param.required),
                format!("{}.parameters.{}.{}", base, location, name),
                format!(
                    "{} {} parameter '{}' was added",
                    requirement(param.required),
                    location,
                    name
                ),
            )
            .complexity(if param.required { 3 } else { 1 })
            .target(param),
        );
    }
}

fn requirement(required: bool) -> &'static str {
    if required {
        "Required"
    } else {
        "Optional"
    }
}

fn compare_request_body(
    old: Option<&RequestBody>,
    new: Option<&RequestBody>,
    base: &str,
    out: &mut ChangeCollector<'_>,
) {
    let path = format!("{}.requestBody", base);
    let change = |severity: Severity, description: &str| {
        CompatibilityChange::new(
            ChangeCategory::RequestBodyChanged,
            severity,
            path.clone(),
            description.to_string(),
        )
    };

    match (old, new) {
        (None, None) => {}
        (None, Some(body)) => out.push(
            change(
                Severity::breaking_if(body.required),
                if body.required {
                    "Required request body was added"
                } else {
                    "Optional request body was added"
                },
            )
            .complexity(if body.required { 3 } else { 1 })
            .target(body),
        ),
        (Some(body), None) => out.push(
            change(Severity::Breaking, "Request body was removed")
                .complexity(3)
                .source(body),
        ),
        (Some(a), Some(b)) => {
            if a.type_ref != b.type_ref {
                out.push(
                    change(Severity::Breaking, "Request body type changed")
                        .complexity(4)
                        .source(&a.type_ref)
                        .target(&b.type_ref),
                );
            }
            if a.required != b.required {
                out.push(
                    change(
                        Severity::breaking_if(b.required),
                        if b.required {
                            "Request body changed from optional to required"
                        } else {
                            "Request body changed from required to optional"
                        },
                    )
                    .complexity(if b.required { 3 } else { 1 })
                    .source(a.required)
                    .target(b.required),
                );
            }
        }
    }
}

/// Only 2xx responses are part of the contract clients code against
fn compare_responses(
    old: &[ResponseDefinition],
    new: &[ResponseDefinition],
    base: &str,
    out: &mut ChangeCollector<'_>,
) {
    let old_responses: BTreeMap<&str, &ResponseDefinition> =
        old.iter().map(|r| (r.status_code.as_str(), r)).collect();
    let new_responses: BTreeMap<&str, &ResponseDefinition> =
        new.iter().map(|r| (r.status_code.as_str(), r)).collect();

    for (status, response) in &old_responses {
        let path = format!("{}.responses.{}", base, status);
        let success = response.is_success();
        match new_responses.get(status) {
            None => out.push(
                CompatibilityChange::new(
                    ChangeCategory::ResponseRemoved,
                    Severity::breaking_if(success),
                    &path,
                    format!("Response {} was removed", status),
                )
                .complexity(if success { 3 } else { 1 })
                .source(&response.type_ref),
            ),
            Some(current) if current.type_ref != response.type_ref => out.push(
                CompatibilityChange::new(
                    ChangeCategory::ResponseModified,
                    Severity::breaking_if(success),
                    &path,
                    format!(
                        "Response {} type changed from {} to {}",
                        status,
                        response.type_ref.as_deref().unwrap_or("<empty>"),
                        current.type_ref.as_deref().unwrap_or("<empty>")
                    ),
                )
                .complexity(if success { 4 } else { 2 })
                .source(&response.type_ref)
                .target(&current.type_ref),
            ),
            Some(_) => {}
        }
    }

    for (status, response) in &new_responses {
        if old_responses.contains_key(status) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::ResponseAdded,
                Severity::NonBreaking,
                format!("{}.responses.{}", base, status),
                format!("Response {} was added", status),
            )
            .complexity(1)
            .target(&response.type_ref),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::IgnoreRules;
    use serde_json::json;

    fn schema(endpoints: serde_json::Value) -> CanonicalSchema {
        serde_json::from_value(json!({
            "providerId": "acme",
            "version": "1.0.0",
            "endpoints": endpoints
        }))
        .unwrap()
    }

    fn diff(source: &CanonicalSchema, target: &CanonicalSchema) -> Vec<CompatibilityChange> {
        let rules = IgnoreRules::default();
        let mut out = ChangeCollector::new(&rules, &[]);
        compare_endpoints(source, target, &mut out);
        out.finish().0
    }

    fn get_user(extra: serde_json::Value) -> serde_json::Value {
        let mut endpoint = json!({
            "operationId": "getUser",
            "path": "/users/{id}",
            "method": "GET",
            "parameters": [{"name": "id", "location": "path", "typeRef": "string", "required": true}],
            "responses": [{"statusCode": "200", "typeRef": "User"}, {"statusCode": "404"}]
        });
        if let (Some(target), Some(extra)) = (endpoint.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        endpoint
    }

    #[test]
    fn test_endpoint_added_and_removed() {
        let a = schema(json!([get_user(json!({}))]));
        let b = schema(json!([]));

        let removed = diff(&a, &b);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].category, ChangeCategory::EndpointRemoved);
        assert_eq!(removed[0].severity, Severity::Breaking);
        assert_eq!(removed[0].impact.migration_complexity, 5);

        let added = diff(&b, &a);
        assert_eq!(added[0].category, ChangeCategory::EndpointAdded);
        assert_eq!(added[0].severity, Severity::NonBreaking);
    }

    #[test]
    fn test_path_and_method_changes() {
        let a = schema(json!([get_user(json!({}))]));
        let b = schema(json!([get_user(json!({"path": "/members/{id}", "method": "post"}))]));
        let changes = diff(&a, &b);
        assert_eq!(changes.len(), 2);
        let method = changes.iter().find(|c| c.path.ends_with(".method")).unwrap();
        assert_eq!(method.impact.migration_complexity, 3);
        let path = changes.iter().find(|c| c.path.ends_with(".path")).unwrap();
        assert_eq!(path.impact.migration_complexity, 4);
        assert!(changes.iter().all(|c| c.is_breaking()));
    }

    #[test]
    fn test_method_case_is_ignored() {
        let a = schema(json!([get_user(json!({}))]));
        let b = schema(json!([get_user(json!({"method": "get"}))]));
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn test_parameter_rules() {
        let a = schema(json!([get_user(json!({}))]));
        let b = schema(json!([get_user(json!({"parameters": [
            {"name": "id", "location": "path", "typeRef": "string", "required": true},
            {"name": "expand", "location": "query", "typeRef": "string"},
            {"name": "X-Tenant", "location": "header", "typeRef": "string", "required": true}
        ]}))]));
        let changes = diff(&a, &b);
        let optional = changes.iter().find(|c| c.path.ends_with("query.expand")).unwrap();
        assert_eq!(optional.severity, Severity::NonBreaking);
        let required = changes.iter().find(|c| c.path.ends_with("header.X-Tenant")).unwrap();
        assert_eq!(required.severity, Severity::Breaking);
    }

    #[test]
    fn test_response_rules() {
        let a = schema(json!([get_user(json!({}))]));
        let b = schema(json!([get_user(json!({"responses": [
            {"statusCode": "200", "typeRef": "UserV2"},
            {"statusCode": "429"}
        ]}))]));
        let changes = diff(&a, &b);
        let modified = changes.iter().find(|c| c.category == ChangeCategory::ResponseModified).unwrap();
        assert!(modified.is_breaking());
        let removed = changes.iter().find(|c| c.category == ChangeCategory::ResponseRemoved).unwrap();
        assert_eq!(removed.path, "endpoints.getUser.responses.404");
        assert_eq!(removed.severity, Severity::NonBreaking);
        let added = changes.iter().find(|c| c.category == ChangeCategory::ResponseAdded).unwrap();
        assert_eq!(added.severity, Severity::NonBreaking);
    }

    #[test]
    fn test_request_body_becomes_required() {
        let a = schema(json!([get_user(json!({"requestBody": {"typeRef": "Patch"}}))]));
        let b = schema(json!([get_user(json!({"requestBody": {"typeRef": "Patch", "required": true}}))]));
        let changes = diff(&a, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category, ChangeCategory::RequestBodyChanged);
        assert!(changes[0].is_breaking());
    }

    #[test]
    fn test_deprecation_is_informational() {
        let a = schema(json!([get_user(json!({}))]));
        let b = schema(json!([get_user(json!({"deprecated": true}))]));
        let changes = diff(&a, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].severity, Severity::Informational);
    }
}

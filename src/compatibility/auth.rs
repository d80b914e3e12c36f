//! Authentication scheme and error code comparison

use std::collections::BTreeMap;

use super::{ChangeCategory, ChangeCollector, CompatibilityChange, Severity};
use crate::schema::{AuthScheme, CanonicalSchema, ErrorDefinition};

/// Compare authentication schemes keyed by id
pub fn compare_auth_schemes(
    source: &CanonicalSchema,
    target: &CanonicalSchema,
    out: &mut ChangeCollector<'_>,
) {
    let old: BTreeMap<&str, &AuthScheme> =
        source.auth_schemes.iter().map(|a| (a.id.as_str(), a)).collect();
    let new: BTreeMap<&str, &AuthScheme> =
        target.auth_schemes.iter().map(|a| (a.id.as_str(), a)).collect();

    for (id, scheme) in &old {
        let path = format!("authentication.{}", id);
        if !out.enter(&path) {
            continue;
        }
        match new.get(id) {
            None => out.push(
                CompatibilityChange::new(
                    ChangeCategory::AuthSchemeRemoved,
                    Severity::Breaking,
                    path,
                    format!("Authentication scheme '{}' was removed", id),
                )
                .complexity(4)
                .source(&scheme.scheme_type),
            ),
            Some(current) if current.scheme_type != scheme.scheme_type => out.push(
                CompatibilityChange::new(
                    ChangeCategory::AuthSchemeModified,
                    Severity::Breaking,
                    path,
                    format!(
                        "Authentication scheme '{}' type changed from {} to {}",
                        id, scheme.scheme_type, current.scheme_type
                    ),
                )
                .complexity(4)
                .source(&scheme.scheme_type)
                .target(&current.scheme_type),
            ),
            Some(_) => {}
        }
    }

    for (id, scheme) in &new {
        let path = format!("authentication.{}", id);
        if old.contains_key(id) || !out.enter(&path) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::AuthSchemeAdded,
                Severity::NonBreaking,
                path,
                format!("Authentication scheme '{}' was added", id),
            )
            .complexity(1)
            .target(&scheme.scheme_type),
        );
    }
}

/// Compare error codes.
///
/// Clients must already tolerate codes they do not know, so a removed code is
/// informational rather than breaking.
pub fn compare_errors(
    source: &CanonicalSchema,
    target: &CanonicalSchema,
    out: &mut ChangeCollector<'_>,
) {
    let old: BTreeMap<&str, &ErrorDefinition> =
        source.errors.iter().map(|e| (e.code.as_str(), e)).collect();
    let new: BTreeMap<&str, &ErrorDefinition> =
        target.errors.iter().map(|e| (e.code.as_str(), e)).collect();

    for code in old.keys().filter(|code| !new.contains_key(*code)) {
        let path = format!("errors.{}", code);
        if !out.enter(&path) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::ErrorCodeRemoved,
                Severity::Informational,
                path,
                format!("Error code '{}' was removed", code),
            )
            .source(code),
        );
    }

    for code in new.keys().filter(|code| !old.contains_key(*code)) {
        let path = format!("errors.{}", code);
        if !out.enter(&path) {
            continue;
        }
        out.push(
            CompatibilityChange::new(
                ChangeCategory::ErrorCodeAdded,
                Severity::NonBreaking,
                path,
                format!("Error code '{}' was added", code),
            )
            .complexity(1)
            .target(code),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::IgnoreRules;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> CanonicalSchema {
        let mut base = json!({"providerId": "acme", "version": "1.0.0"});
        if let (Some(target), Some(extra)) = (base.as_object_mut(), value.as_object()) {
            target.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_auth_scheme_rules() {
        let old = schema(json!({"authSchemes": [
            {"id": "bearer", "type": "http"},
            {"id": "key", "type": "apiKey"}
        ]}));
        let new = schema(json!({"authSchemes": [
            {"id": "bearer", "type": "oauth2"},
            {"id": "mtls", "type": "mutualTLS"}
        ]}));
        let rules = IgnoreRules::default();
        let mut out = ChangeCollector::new(&rules, &[]);
        compare_auth_schemes(&old, &new, &mut out);
        let (changes, _) = out.finish();

        let by_category = |c: ChangeCategory| changes.iter().find(|x| x.category == c).unwrap();
        assert!(by_category(ChangeCategory::AuthSchemeModified).is_breaking());
        assert!(by_category(ChangeCategory::AuthSchemeRemoved).is_breaking());
        assert_eq!(by_category(ChangeCategory::AuthSchemeAdded).severity, Severity::NonBreaking);
    }

    #[test]
    fn test_error_code_rules() {
        let old = schema(json!({"errors": [{"code": "NOT_FOUND"}, {"code": "LEGACY"}]}));
        let new = schema(json!({"errors": [{"code": "NOT_FOUND"}, {"code": "RATE_LIMITED"}]}));
        let rules = IgnoreRules::default();
        let mut out = ChangeCollector::new(&rules, &[]);
        compare_errors(&old, &new, &mut out);
        let (changes, _) = out.finish();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "errors.LEGACY");
        assert_eq!(changes[0].severity, Severity::Informational);
        assert_eq!(changes[1].category, ChangeCategory::ErrorCodeAdded);
        assert_eq!(changes[1].severity, Severity::NonBreaking);
    }
}

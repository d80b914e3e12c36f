//! Reproducibility of analysis results

use schema_compat::schema::{PropertyDefinition, TypeDefinition};
use schema_compat::{
    AnalysisOptions, AnalysisRequest, AnalysisResponse, Analyzer, CanonicalSchema, TypeKind,
};

fn users_v1() -> CanonicalSchema {
    serde_json::from_str(include_str!("fixtures/users_v1.json")).unwrap()
}

fn users_v1_reordered() -> CanonicalSchema {
    serde_json::from_str(include_str!("fixtures/users_v1_reordered.json")).unwrap()
}

/// Several changes across categories
fn users_v2() -> CanonicalSchema {
    let mut schema = users_v1();
    schema.version = "2.0.0".to_string();
    schema.endpoints.retain(|e| e.operation_id != "deleteUser");
    schema.errors.retain(|e| e.code != "UNAUTHORIZED");
    for ty in &mut schema.types {
        match (&ty.id[..], &mut ty.kind) {
            ("Role", TypeKind::Enum { values }) => values.retain(|v| v != "guest"),
            ("User", TypeKind::Object { properties }) => properties.retain(|p| p.name != "name"),
            _ => {}
        }
    }
    schema
}

fn run(source: CanonicalSchema, target: CanonicalSchema) -> AnalysisResponse {
    Analyzer::default().analyze(&AnalysisRequest::new(source, target))
}

#[test]
fn test_repeated_runs_agree() {
    let first = run(users_v1(), users_v2());
    let second = run(users_v1(), users_v2());

    assert!(first.success);
    assert!(!first.changes.is_empty());
    assert_eq!(
        first.analysis_metadata.determinism_hash,
        second.analysis_metadata.determinism_hash
    );
    assert_eq!(first.analysis_metadata.input_hash, second.analysis_metadata.input_hash);
    assert_eq!(first.changes, second.changes);
    assert_ne!(first.request_id, second.request_id);
}

#[test]
fn test_serialization_order_does_not_matter() {
    let a = users_v1();
    let b = users_v1_reordered();
    assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());

    let same = run(a.clone(), b.clone());
    assert!(same.changes.is_empty());

    let forward = run(a, users_v2());
    let reordered = run(b, users_v2());
    assert_eq!(
        forward.analysis_metadata.determinism_hash,
        reordered.analysis_metadata.determinism_hash
    );
    assert_eq!(forward.analysis_metadata.input_hash, reordered.analysis_metadata.input_hash);
    let ids = |r: &AnalysisResponse| r.changes.iter().map(|c| c.change_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&forward), ids(&reordered));
}

/// Target with an added `Pet` object whose properties come in `names` order
fn with_pet(names: &[&str]) -> CanonicalSchema {
    let mut schema = users_v1();
    schema.version = "1.5.0".to_string();
    schema.types.push(TypeDefinition {
        id: "Pet".to_string(),
        description: None,
        kind: TypeKind::Object {
            properties: names
                .iter()
                .map(|name| PropertyDefinition {
                    name: name.to_string(),
                    type_ref: "string".to_string(),
                    required: false,
                })
                .collect(),
        },
    });
    schema
}

#[test]
fn test_added_type_ids_ignore_property_order() {
    let forward = run(users_v1(), with_pet(&["age", "name"]));
    let reversed = run(users_v1(), with_pet(&["name", "age"]));

    assert_eq!(forward.analysis_metadata.input_hash, reversed.analysis_metadata.input_hash);
    assert_eq!(forward.changes.len(), 1);
    assert_eq!(forward.changes, reversed.changes);
    assert_eq!(
        forward.analysis_metadata.determinism_hash,
        reversed.analysis_metadata.determinism_hash
    );

    let detailed = AnalysisOptions {
        include_detailed_diff: true,
        ..AnalysisOptions::default()
    };
    let analyzer = Analyzer::default();
    let a = analyzer.analyze(
        &AnalysisRequest::new(users_v1(), with_pet(&["age", "name"])).with_options(detailed.clone()),
    );
    let b = analyzer
        .analyze(&AnalysisRequest::new(users_v1(), with_pet(&["name", "age"])).with_options(detailed));
    assert_eq!(a.changes[0].target_value, b.changes[0].target_value);
    assert_eq!(a.changes[0].change_id, b.changes[0].change_id);
}

#[test]
fn test_changes_are_sorted_by_path() {
    let response = run(users_v1(), users_v2());
    let paths: Vec<&str> = response.changes.iter().map(|c| c.path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn test_options_change_input_hash_only_when_meaningful() {
    let analyzer = Analyzer::default();
    let base = AnalysisRequest::new(users_v1(), users_v2());

    let with_guidance = analyzer.analyze(&base);
    let without_guidance = analyzer.analyze(&base.clone().with_options(AnalysisOptions {
        include_upgrade_guidance: false,
        ..AnalysisOptions::default()
    }));

    assert_ne!(
        with_guidance.analysis_metadata.input_hash,
        without_guidance.analysis_metadata.input_hash
    );
    // Guidance text is not part of the decision.
    assert_eq!(
        with_guidance.analysis_metadata.determinism_hash,
        without_guidance.analysis_metadata.determinism_hash
    );
}

#[test]
fn test_concurrent_analyses_match() {
    let analyzer = Analyzer::default();
    let expected = run(users_v1(), users_v2()).analysis_metadata.determinism_hash;

    let hashes: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    analyzer
                        .analyze(&AnalysisRequest::new(users_v1(), users_v2()))
                        .analysis_metadata
                        .determinism_hash
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(hashes.iter().all(|h| *h == expected));
}

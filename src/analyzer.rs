//! Analysis orchestrator
//!
//! Drives one request through
//! `Validating -> PreconditionCheck -> Comparing -> Aggregating -> Done`.
//! Any failure, including a panic inside comparison or aggregation, ends in
//! `Failed` and is reported on the same response shape as a success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compatibility::{
    AnalysisCategory, AnalysisWarning, CompatibilityChange, CompatibilityChecker, IgnoreRules,
};
use crate::config::CompatConfig;
use crate::determinism;
use crate::error::{AnalysisError, ErrorCode, Result, SchemaSide};
use crate::guidance::generate_upgrade_guidance;
use crate::reference::ReferenceIndex;
use crate::schema::{CanonicalSchema, SchemaVersion};
use crate::verdict::{CompatibilitySummary, CompatibilityVerdict, Strictness};
use crate::version::{calculate_version_recommendation, VersionRecommendation};

/// Version reported in `analysisMetadata.agentVersion`
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-request options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default)]
    pub strictness: Strictness,
    #[serde(default = "default_true")]
    pub include_upgrade_guidance: bool,
    #[serde(default)]
    pub include_detailed_diff: bool,
    /// Empty means every category
    #[serde(default)]
    pub analyze_categories: Vec<AnalysisCategory>,
    #[serde(default)]
    pub ignore_paths: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            strictness: Strictness::Standard,
            include_upgrade_guidance: true,
            include_detailed_diff: false,
            analyze_categories: Vec::new(),
            ignore_paths: Vec::new(),
        }
    }
}

impl AnalysisOptions {
    /// Options seeded from configuration defaults
    pub fn from_config(config: &CompatConfig) -> Self {
        Self {
            strictness: config.analysis.strictness,
            include_upgrade_guidance: config.analysis.include_upgrade_guidance,
            include_detailed_diff: config.analysis.include_detailed_diff,
            analyze_categories: config.analysis.categories.clone(),
            ignore_paths: config.analysis.ignore_paths.clone(),
        }
    }

    /// Requested categories, de-duplicated and ordered
    pub fn effective_categories(&self) -> BTreeSet<AnalysisCategory> {
        if self.analyze_categories.is_empty() {
            AnalysisCategory::ALL.into_iter().collect()
        } else {
            self.analyze_categories.iter().copied().collect()
        }
    }
}

/// An analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub request_id: Uuid,
    pub source_schema: CanonicalSchema,
    pub target_schema: CanonicalSchema,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(source_schema: CanonicalSchema, target_schema: CanonicalSchema) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            source_schema,
            target_schema,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }
}

/// Lifecycle of one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStage {
    Validating,
    PreconditionCheck,
    Comparing,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Validating => "validating",
            AnalysisStage::PreconditionCheck => "precondition-check",
            AnalysisStage::Comparing => "comparing",
            AnalysisStage::Aggregating => "aggregating",
            AnalysisStage::Done => "done",
            AnalysisStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How much the result can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    /// Some type references could not be resolved
    Reduced,
}

/// A failure reported on the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    /// Stage the analysis was in when it failed
    pub stage: AnalysisStage,
    pub partial_analysis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub agent_version: String,
    pub analyzed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Output hash; empty when the analysis failed
    pub determinism_hash: String,
    pub input_hash: String,
    pub confidence: Confidence,
}

/// Outcome of one analysis, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<SchemaVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<SchemaVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<CompatibilityVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CompatibilitySummary>,
    pub changes: Vec<CompatibilityChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_recommendation: Option<VersionRecommendation>,
    pub analysis_metadata: AnalysisMetadata,
    pub warnings: Vec<AnalysisWarning>,
    pub errors: Vec<ErrorDetail>,
}

impl AnalysisResponse {
    /// First error code, if the analysis failed
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.errors.first().map(|e| e.code)
    }
}

/// Everything produced by a successful run
struct Completed {
    source_version: SchemaVersion,
    target_version: SchemaVersion,
    verdict: CompatibilityVerdict,
    summary: CompatibilitySummary,
    changes: Vec<CompatibilityChange>,
    recommendation: VersionRecommendation,
    warnings: Vec<AnalysisWarning>,
    input_hash: String,
    output_hash: String,
    confidence: Confidence,
}

/// Partial state carried into a failure response
#[derive(Default)]
struct Progress {
    source_version: Option<SchemaVersion>,
    target_version: Option<SchemaVersion>,
}

/// Runs compatibility analyses.
///
/// Holds only configuration, so one instance can serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: CompatConfig,
}

impl Analyzer {
    pub fn new(config: CompatConfig) -> Self {
        Self { config }
    }

    /// Build from layered configuration, see [`CompatConfig::load_from`]
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Ok(Self::new(CompatConfig::load_from(config_path)?))
    }

    pub fn config(&self) -> &CompatConfig {
        &self.config
    }

    /// Analyze a typed request. Never panics and never returns an error:
    /// failures come back as `success = false`.
    pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisResponse {
        let started = Instant::now();
        let analyzed_at = Utc::now();
        let mut stage = AnalysisStage::Validating;
        let mut progress = Progress::default();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(request, &mut stage, &mut progress)
        }))
        .unwrap_or_else(|payload| Err(AnalysisError::Internal(panic_message(payload.as_ref()))));

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(done) => {
                info!(
                    request_id = %request.request_id,
                    verdict = %done.verdict,
                    changes = done.changes.len(),
                    bump = %done.recommendation.bump_type,
                    duration_ms,
                    "analysis complete"
                );
                AnalysisResponse {
                    request_id: request.request_id,
                    success: true,
                    source_version: Some(done.source_version),
                    target_version: Some(done.target_version),
                    verdict: Some(done.verdict),
                    summary: Some(done.summary),
                    changes: done.changes,
                    version_recommendation: Some(done.recommendation),
                    analysis_metadata: AnalysisMetadata {
                        agent_version: AGENT_VERSION.to_string(),
                        analyzed_at,
                        duration_ms,
                        determinism_hash: done.output_hash,
                        input_hash: done.input_hash,
                        confidence: done.confidence,
                    },
                    warnings: done.warnings,
                    errors: Vec::new(),
                }
            }
            Err(err) => {
                warn!(
                    request_id = %request.request_id,
                    stage = %stage,
                    code = %err.code(),
                    error = %err,
                    "analysis failed"
                );
                failure_response(request.request_id, &err, stage, progress, analyzed_at, duration_ms)
            }
        }
    }

    /// Analyze an untyped JSON request.
    ///
    /// Each part is decoded separately so a malformed schema is attributed to
    /// the side it came from.
    pub fn analyze_value(&self, request: &serde_json::Value) -> AnalysisResponse {
        let started = Instant::now();
        let analyzed_at = Utc::now();

        let request_id = request
            .get("requestId")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        let decoded = decode_schema(request, "sourceSchema", SchemaSide::Source).and_then(|source| {
            let target = decode_schema(request, "targetSchema", SchemaSide::Target)?;
            let options = match request.get("options") {
                None | Some(serde_json::Value::Null) => AnalysisOptions::default(),
                Some(value) => serde_json::from_value(value.clone())?,
            };
            Ok(AnalysisRequest {
                request_id,
                source_schema: source,
                target_schema: target,
                options,
            })
        });

        self.analyze_decoded(request_id, decoded, started, analyzed_at)
    }

    /// Analyze two schema documents given as JSON text.
    ///
    /// Text that is not a valid schema is reported as an invalid schema for
    /// its side, on the same response shape as every other failure.
    pub fn analyze_documents(
        &self,
        source: &str,
        target: &str,
        options: AnalysisOptions,
    ) -> AnalysisResponse {
        let started = Instant::now();
        let analyzed_at = Utc::now();
        let request_id = Uuid::new_v4();

        let decoded = parse_schema(source, SchemaSide::Source).and_then(|source_schema| {
            Ok(AnalysisRequest {
                request_id,
                source_schema,
                target_schema: parse_schema(target, SchemaSide::Target)?,
                options,
            })
        });

        self.analyze_decoded(request_id, decoded, started, analyzed_at)
    }

    fn analyze_decoded(
        &self,
        request_id: Uuid,
        decoded: Result<AnalysisRequest>,
        started: Instant,
        analyzed_at: DateTime<Utc>,
    ) -> AnalysisResponse {
        match decoded {
            Ok(typed) => self.analyze(&typed),
            Err(err) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                warn!(request_id = %request_id, error = %err, "request rejected");
                failure_response(
                    request_id,
                    &err,
                    AnalysisStage::Validating,
                    Progress::default(),
                    analyzed_at,
                    duration_ms,
                )
            }
        }
    }

    fn run(
        &self,
        request: &AnalysisRequest,
        stage: &mut AnalysisStage,
        progress: &mut Progress,
    ) -> Result<Completed> {
        let source = &request.source_schema;
        let target = &request.target_schema;
        let options = &request.options;

        transition(stage, AnalysisStage::Validating, request.request_id);
        source.validate(SchemaSide::Source)?;
        target.validate(SchemaSide::Target)?;
        let source_version = source.version_info()?;
        let target_version = target.version_info()?;
        progress.source_version = Some(source_version.clone());
        progress.target_version = Some(target_version.clone());

        transition(stage, AnalysisStage::PreconditionCheck, request.request_id);
        if source.provider_id != target.provider_id {
            return Err(AnalysisError::IncompatibleProviders {
                source_provider: source.provider_id.clone(),
                target_provider: target.provider_id.clone(),
            });
        }

        transition(stage, AnalysisStage::Comparing, request.request_id);
        self.check_limits(source, SchemaSide::Source)?;
        self.check_limits(target, SchemaSide::Target)?;

        let categories = options.effective_categories();
        let checker = CompatibilityChecker::new(source, target)
            .ignoring(IgnoreRules::new(&options.ignore_paths))
            .languages(self.config.impact.languages.clone());
        let outcome = checker.compare(&categories);

        let mut warnings = outcome.warnings;
        if categories.contains(&AnalysisCategory::Types) || categories.contains(&AnalysisCategory::Endpoints) {
            warnings.extend(unresolved_warnings(source, SchemaSide::Source));
            warnings.extend(unresolved_warnings(target, SchemaSide::Target));
        }
        let confidence = if warnings.iter().any(|w| w.code == ErrorCode::TypeResolutionFailure) {
            Confidence::Reduced
        } else {
            Confidence::High
        };

        transition(stage, AnalysisStage::Aggregating, request.request_id);
        let mut changes = outcome.changes;
        let summary = CompatibilitySummary::from_changes(&changes);
        let verdict = self.config.verdict.determine_verdict(&changes, options.strictness);
        let recommendation = calculate_version_recommendation(&source.version, &changes);

        for change in &mut changes {
            if options.include_upgrade_guidance {
                change.upgrade_guidance = Some(generate_upgrade_guidance(change));
            }
            if !options.include_detailed_diff {
                change.source_value = None;
                change.target_value = None;
            }
        }

        let input_hash = determinism::input_hash(&source_version, &target_version, options)?;
        let output_hash = determinism::output_hash(verdict, &summary, &changes, &recommendation)?;

        transition(stage, AnalysisStage::Done, request.request_id);
        Ok(Completed {
            source_version,
            target_version,
            verdict,
            summary,
            changes,
            recommendation,
            warnings,
            input_hash: input_hash.to_string(),
            output_hash: output_hash.to_string(),
            confidence,
        })
    }

    fn check_limits(&self, schema: &CanonicalSchema, side: SchemaSide) -> Result<()> {
        let limit = self.config.limits.max_schema_elements;
        let elements = schema.element_count();
        if elements > limit {
            return Err(AnalysisError::ResourceExhaustion { side, elements, limit });
        }
        Ok(())
    }
}

fn transition(stage: &mut AnalysisStage, next: AnalysisStage, request_id: Uuid) {
    debug!(request_id = %request_id, from = %stage, to = %next, "stage transition");
    *stage = next;
}

fn decode_schema(request: &serde_json::Value, field: &str, side: SchemaSide) -> Result<CanonicalSchema> {
    let value = request.get(field).ok_or_else(|| AnalysisError::InvalidSchema {
        side,
        reasons: vec![format!("missing {}", field)],
    })?;
    serde_json::from_value(value.clone()).map_err(|e| AnalysisError::InvalidSchema {
        side,
        reasons: vec![e.to_string()],
    })
}

fn parse_schema(text: &str, side: SchemaSide) -> Result<CanonicalSchema> {
    serde_json::from_str(text).map_err(|e| AnalysisError::InvalidSchema {
        side,
        reasons: vec![e.to_string()],
    })
}

fn unresolved_warnings(schema: &CanonicalSchema, side: SchemaSide) -> Vec<AnalysisWarning> {
    ReferenceIndex::build(schema)
        .unresolved()
        .iter()
        .map(|r| {
            let err = AnalysisError::TypeResolution {
                type_id: r.type_id.clone(),
                path: r.path.clone(),
            };
            AnalysisWarning {
                code: err.code(),
                message: format!("{} schema: {}; treated as unknown", side, err),
                path: Some(r.path.clone()),
            }
        })
        .collect()
}

fn failure_response(
    request_id: Uuid,
    err: &AnalysisError,
    stage: AnalysisStage,
    progress: Progress,
    analyzed_at: DateTime<Utc>,
    duration_ms: u64,
) -> AnalysisResponse {
    AnalysisResponse {
        request_id,
        success: false,
        source_version: progress.source_version,
        target_version: progress.target_version,
        verdict: None,
        summary: None,
        changes: Vec::new(),
        version_recommendation: None,
        analysis_metadata: AnalysisMetadata {
            agent_version: AGENT_VERSION.to_string(),
            analyzed_at,
            duration_ms,
            determinism_hash: String::new(),
            input_hash: String::new(),
            confidence: Confidence::High,
        },
        warnings: Vec::new(),
        errors: vec![ErrorDetail {
            code: err.code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            stage,
            partial_analysis: false,
        }],
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "internal error during analysis".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(provider: &str, version: &str) -> CanonicalSchema {
        serde_json::from_value(json!({
            "providerId": provider,
            "version": version,
            "types": [
                {"id": "string", "kind": "primitive", "format": "string"},
                {"id": "User", "kind": "object", "properties": [
                    {"name": "id", "typeRef": "string", "required": true}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_identical_schemas() {
        let analyzer = Analyzer::default();
        let response = analyzer.analyze(&AnalysisRequest::new(schema("acme", "1.0.0"), schema("acme", "1.0.0")));
        assert!(response.success);
        assert_eq!(response.verdict, Some(CompatibilityVerdict::FullyCompatible));
        assert_eq!(response.summary.unwrap().total_changes, 0);
        assert_eq!(response.analysis_metadata.determinism_hash.len(), 64);
        assert_eq!(response.analysis_metadata.confidence, Confidence::High);
    }

    #[test]
    fn test_documents_attribute_malformed_text_to_its_side() {
        let analyzer = Analyzer::default();
        let valid = serde_json::to_string(&schema("acme", "1.0.0")).unwrap();

        let response = analyzer.analyze_documents("{ not json", &valid, AnalysisOptions::default());
        assert!(!response.success);
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidSourceSchema));
        assert_eq!(response.errors[0].stage, AnalysisStage::Validating);

        let response = analyzer.analyze_documents(&valid, "[]", AnalysisOptions::default());
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidTargetSchema));

        let response = analyzer.analyze_documents(&valid, &valid, AnalysisOptions::default());
        assert!(response.success);
    }

    #[test]
    fn test_validation_failure_reports_side() {
        let analyzer = Analyzer::default();
        let response = analyzer.analyze(&AnalysisRequest::new(schema("acme", "1.0.0"), schema("acme", "")));
        assert!(!response.success);
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidTargetSchema));
        assert_eq!(response.errors[0].stage, AnalysisStage::Validating);
        assert!(!response.errors[0].partial_analysis);
    }

    #[test]
    fn test_resource_limit() {
        let mut config = CompatConfig::default();
        config.limits.max_schema_elements = 1;
        let analyzer = Analyzer::new(config);
        let response = analyzer.analyze(&AnalysisRequest::new(schema("acme", "1.0.0"), schema("acme", "1.0.1")));
        assert_eq!(response.error_code(), Some(ErrorCode::ResourceExhaustion));
        assert_eq!(response.errors[0].stage, AnalysisStage::Comparing);
        assert!(response.source_version.is_some());
    }

    #[test]
    fn test_unresolved_reference_reduces_confidence() {
        let mut target = schema("acme", "1.0.0");
        target.types.push(serde_json::from_value(json!({
            "id": "Team", "kind": "array", "items": "Member"
        })).unwrap());
        let response = Analyzer::default().analyze(&AnalysisRequest::new(schema("acme", "1.0.0"), target));
        assert!(response.success);
        assert_eq!(response.analysis_metadata.confidence, Confidence::Reduced);
        assert!(response
            .warnings
            .iter()
            .any(|w| w.code == ErrorCode::TypeResolutionFailure && w.path.as_deref() == Some("types.Team.items")));
    }

    #[test]
    fn test_analyze_value_attributes_bad_source() {
        let request = json!({
            "requestId": "6f1c2b8e-3d4a-4c5b-9e6f-7a8b9c0d1e2f",
            "sourceSchema": {"providerId": "acme"},
            "targetSchema": serde_json::to_value(schema("acme", "1.0.0")).unwrap()
        });
        let response = Analyzer::default().analyze_value(&request);
        assert!(!response.success);
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidSourceSchema));
        assert_eq!(response.request_id.to_string(), "6f1c2b8e-3d4a-4c5b-9e6f-7a8b9c0d1e2f");
    }

    #[test]
    fn test_analyze_value_missing_target() {
        let request = json!({
            "sourceSchema": serde_json::to_value(schema("acme", "1.0.0")).unwrap()
        });
        let response = Analyzer::default().analyze_value(&request);
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidTargetSchema));
    }

    #[test]
    fn test_options_default_to_all_categories() {
        let options = AnalysisOptions::default();
        assert_eq!(options.effective_categories().len(), 4);
        let parsed: AnalysisOptions = serde_json::from_value(json!({"analyzeCategories": ["errors"]})).unwrap();
        assert!(parsed.include_upgrade_guidance);
        assert_eq!(parsed.effective_categories().len(), 1);
    }
}

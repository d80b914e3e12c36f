//! Schema Compatibility Analysis
//!
//! Compares two versions of a canonical API schema and reports what changed,
//! how severe each change is, an overall compatibility verdict and the
//! semantic version bump the target should carry.
//!
//! ## Features
//!
//! - **Structural diffing**: types, endpoints, authentication schemes and error codes
//! - **Impact tracing**: removed types report every location that reaches them
//! - **Verdicts**: strictness-aware classification with configurable thresholds
//! - **Version recommendations**: major/minor/patch/none from the change set
//! - **Reproducibility**: input and output hashes independent of input ordering
//!
//! ## Pipeline
//!
//! ```text
//! request ─▶ validate ─▶ provider check ─▶ compare (types │ endpoints │ auth │ errors)
//!                                               │
//!         response ◀─ hash ◀─ guidance ◀─ verdict + recommendation ◀─ summary
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use schema_compat::{AnalysisRequest, Analyzer, CanonicalSchema};
//!
//! let source: CanonicalSchema = serde_json::from_str(r#"{"providerId": "acme", "version": "1.0.0"}"#).unwrap();
//! let target = source.clone();
//! let response = Analyzer::default().analyze(&AnalysisRequest::new(source, target));
//! assert!(response.success);
//! ```

pub mod analyzer;
pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod determinism;
pub mod error;
pub mod events;
pub mod guidance;
pub mod reference;
pub mod schema;
pub mod verdict;
pub mod version;

pub use analyzer::{
    AnalysisMetadata, AnalysisOptions, AnalysisRequest, AnalysisResponse, AnalysisStage, Analyzer,
    Confidence, ErrorDetail,
};
pub use checksum::Checksum;
pub use compatibility::{
    AnalysisCategory, AnalysisWarning, ChangeCategory, ChangeImpact, CompatibilityChange,
    CompatibilityChecker, IgnoreRules, Severity,
};
pub use config::CompatConfig;
pub use error::{AnalysisError, ErrorCode, Result};
pub use events::{emit_decision, DecisionEvent, EmitReceipt, EventSink, TracingEventSink};
pub use guidance::generate_upgrade_guidance;
pub use reference::ReferenceIndex;
pub use schema::{CanonicalSchema, SchemaVersion, TypeDefinition, TypeKind};
pub use verdict::{determine_verdict, CompatibilitySummary, CompatibilityVerdict, Strictness};
pub use version::{calculate_version_recommendation, BumpType, VersionRecommendation};

//! Error types for compatibility analysis

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Which side of a comparison a problem belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSide {
    Source,
    Target,
}

impl fmt::Display for SchemaSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSide::Source => write!(f, "source"),
            SchemaSide::Target => write!(f, "target"),
        }
    }
}

/// Analysis errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid {side} schema: {}", .reasons.join("; "))]
    InvalidSchema { side: SchemaSide, reasons: Vec<String> },

    #[error("Cannot compare schemas from different providers: {source_provider} vs {target_provider}")]
    IncompatibleProviders {
        source_provider: String,
        target_provider: String,
    },

    #[error("Unresolved type reference '{type_id}' at {path}")]
    TypeResolution { type_id: String, path: String },

    #[error("Circular reference through type '{type_id}'")]
    CircularReference { type_id: String },

    #[error("{side} schema has {elements} elements, limit is {limit}")]
    ResourceExhaustion {
        side: SchemaSide,
        elements: usize,
        limit: usize,
    },

    #[error("Analysis failed: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl AnalysisError {
    /// Wire code reported in `errors[]` / `warnings[]`
    pub fn code(&self) -> ErrorCode {
        match self {
            AnalysisError::InvalidSchema { side: SchemaSide::Source, .. } => {
                ErrorCode::InvalidSourceSchema
            }
            AnalysisError::InvalidSchema { side: SchemaSide::Target, .. } => {
                ErrorCode::InvalidTargetSchema
            }
            AnalysisError::IncompatibleProviders { .. } => ErrorCode::IncompatibleProviders,
            AnalysisError::TypeResolution { .. } => ErrorCode::TypeResolutionFailure,
            AnalysisError::CircularReference { .. } => ErrorCode::CircularReference,
            AnalysisError::ResourceExhaustion { .. } => ErrorCode::ResourceExhaustion,
            AnalysisError::Internal(_)
            | AnalysisError::Json(_)
            | AnalysisError::Config(_) => ErrorCode::AnalysisFailed,
        }
    }

    /// Whether analysis can continue past this error
    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable()
    }
}

/// Stable error codes exposed on the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidSourceSchema,
    InvalidTargetSchema,
    IncompatibleProviders,
    TypeResolutionFailure,
    CircularReference,
    ResourceExhaustion,
    AnalysisFailed,
}

impl ErrorCode {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::TypeResolutionFailure | ErrorCode::CircularReference
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidSourceSchema => "INVALID_SOURCE_SCHEMA",
            ErrorCode::InvalidTargetSchema => "INVALID_TARGET_SCHEMA",
            ErrorCode::IncompatibleProviders => "INCOMPATIBLE_PROVIDERS",
            ErrorCode::TypeResolutionFailure => "TYPE_RESOLUTION_FAILURE",
            ErrorCode::CircularReference => "CIRCULAR_REFERENCE",
            ErrorCode::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            ErrorCode::AnalysisFailed => "ANALYSIS_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_side() {
        let err = AnalysisError::InvalidSchema {
            side: SchemaSide::Target,
            reasons: vec!["providerId is empty".to_string()],
        };
        assert_eq!(err.code(), ErrorCode::InvalidTargetSchema);
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("providerId is empty"));
    }

    #[test]
    fn test_recoverable_codes() {
        assert!(ErrorCode::CircularReference.is_recoverable());
        assert!(ErrorCode::TypeResolutionFailure.is_recoverable());
        assert!(!ErrorCode::ResourceExhaustion.is_recoverable());
        assert_eq!(
            serde_json::to_string(&ErrorCode::IncompatibleProviders).unwrap(),
            "\"INCOMPATIBLE_PROVIDERS\""
        );
    }
}

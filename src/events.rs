//! Decision event emission
//!
//! Events are published after an analysis has produced its response. Sink
//! failures are logged and never change or retry the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analyzer::AnalysisResponse;
use crate::error::ErrorCode;
use crate::verdict::CompatibilityVerdict;
use crate::version::BumpType;

/// Record of one compatibility decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEvent {
    pub event_id: Uuid,
    pub request_id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<CompatibilityVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bump_type: Option<BumpType>,
    pub breaking_changes: usize,
    pub determinism_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub emitted_at: DateTime<Utc>,
}

impl DecisionEvent {
    pub fn from_response(response: &AnalysisResponse) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            request_id: response.request_id,
            success: response.success,
            source_version: response.source_version.as_ref().map(|v| v.to_string()),
            target_version: response.target_version.as_ref().map(|v| v.to_string()),
            verdict: response.verdict,
            bump_type: response.version_recommendation.as_ref().map(|r| r.bump_type),
            breaking_changes: response
                .summary
                .as_ref()
                .map(|s| s.breaking_changes)
                .unwrap_or(0),
            determinism_hash: response.analysis_metadata.determinism_hash.clone(),
            error_code: response.error_code(),
            emitted_at: Utc::now(),
        }
    }
}

/// Acknowledgement from a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitReceipt {
    pub success: bool,
    pub event_id: Uuid,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Event sink unavailable: {0}")]
    Unavailable(String),

    #[error("Event rejected: {0}")]
    Rejected(String),
}

/// Destination for decision events.
///
/// # Implementers
///
/// - `TracingEventSink`: writes events to the log
/// - external persistence adapters
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DecisionEvent) -> Result<EmitReceipt, SinkError>;
}

/// Sink that logs each event at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &DecisionEvent) -> Result<EmitReceipt, SinkError> {
        let payload = serde_json::to_string(event).map_err(|e| SinkError::Rejected(e.to_string()))?;
        info!(event_id = %event.event_id, request_id = %event.request_id, %payload, "decision event");
        Ok(EmitReceipt {
            success: true,
            event_id: event.event_id,
        })
    }
}

/// Publish the decision for `response`, fire-and-forget.
///
/// Returns the receipt when the sink accepted the event; failures are logged.
pub fn emit_decision(sink: &dyn EventSink, response: &AnalysisResponse) -> Option<EmitReceipt> {
    let event = DecisionEvent::from_response(response);
    match sink.emit(&event) {
        Ok(receipt) if receipt.success => Some(receipt),
        Ok(receipt) => {
            warn!(event_id = %receipt.event_id, request_id = %event.request_id, "decision event not accepted");
            None
        }
        Err(err) => {
            warn!(request_id = %event.request_id, error = %err, "failed to emit decision event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisRequest, Analyzer};
    use crate::schema::CanonicalSchema;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<DecisionEvent>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &DecisionEvent) -> Result<EmitReceipt, SinkError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(EmitReceipt {
                success: true,
                event_id: event.event_id,
            })
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _event: &DecisionEvent) -> Result<EmitReceipt, SinkError> {
            Err(SinkError::Unavailable("connection refused".to_string()))
        }
    }

    fn response() -> AnalysisResponse {
        let schema = CanonicalSchema::new("acme", "1.0.0");
        Analyzer::default().analyze(&AnalysisRequest::new(schema.clone(), schema))
    }

    #[test]
    fn test_event_reflects_response() {
        let response = response();
        let sink = RecordingSink::default();
        let receipt = emit_decision(&sink, &response).unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, receipt.event_id);
        assert_eq!(events[0].request_id, response.request_id);
        assert_eq!(events[0].verdict, Some(CompatibilityVerdict::FullyCompatible));
        assert_eq!(events[0].bump_type, Some(BumpType::None));
    }

    #[test]
    fn test_sink_failure_leaves_response_untouched() {
        let response = response();
        let before = response.clone();
        assert!(emit_decision(&FailingSink, &response).is_none());
        assert_eq!(response, before);
        assert!(emit_decision(&TracingEventSink, &response).is_some());
    }
}

//! Telemetry entry types
//!
//! A [`TelemetryEntry`] is created once per traced operation (or per verbose
//! log call), emitted, and dropped. Entries are never mutated after
//! emission; the `with_*` builders consume and return the entry.

use chrono::{DateTime, Utc};
use sentinel_core::validation::{Validate, Violations};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form structured metadata attached to entries and reports
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Telemetry levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryLevel {
    Information,
    Warning,
    Error,
    Performance,
    Verbose,
}

impl TelemetryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryLevel::Information => "INFORMATION",
            TelemetryLevel::Warning => "WARNING",
            TelemetryLevel::Error => "ERROR",
            TelemetryLevel::Performance => "PERFORMANCE",
            TelemetryLevel::Verbose => "VERBOSE",
        }
    }
}

/// Outcome of a traced execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// One structured telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub timestamp: DateTime<Utc>,
    pub apparatus: String,
    pub operation: String,
    pub level: TelemetryLevel,
    pub message_key: String,

    /// Wall-clock duration in milliseconds (sub-millisecond precision)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Textual trace of the failure (cause chain)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
}

impl TelemetryEntry {
    pub fn new(
        apparatus: impl Into<String>,
        operation: impl Into<String>,
        level: TelemetryLevel,
        message_key: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            apparatus: apparatus.into(),
            operation: operation.into(),
            level,
            message_key: message_key.into(),
            duration_ms: None,
            status: None,
            error: None,
            stack: None,
            metadata: None,
            trace_id: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the failure message and its textual trace
    pub fn with_error(mut self, error: impl Into<String>, stack: Option<String>) -> Self {
        self.error = Some(error.into());
        self.stack = stack;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Single-line JSON rendering, used by the raw diagnostic channel
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"apparatus\":{:?},\"operation\":{:?},\"unserializable\":{:?}}}",
                self.apparatus,
                self.operation,
                e.to_string()
            )
        })
    }
}

impl Validate for TelemetryEntry {
    fn check(&self, v: &mut Violations) {
        v.non_empty("apparatus", &self.apparatus);
        v.non_empty("operation", &self.operation);
        v.non_empty("message_key", &self.message_key);
        if let Some(duration) = self.duration_ms {
            v.non_negative("duration_ms", duration);
        }
        match (self.level, self.status) {
            (TelemetryLevel::Performance, Some(ExecutionStatus::Failed)) => {
                v.push("status", "PERFORMANCE entries cannot carry FAILED")
            }
            (_, Some(ExecutionStatus::Failed)) => {
                v.require("error", self.error.is_some(), "FAILED entries must carry an error")
            }
            _ => {}
        }
        if let Some(metadata) = &self.metadata {
            v.require(
                "metadata",
                metadata.keys().all(|k| !k.is_empty()),
                "metadata keys must not be empty",
            );
        }
    }
}

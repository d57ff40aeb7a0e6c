//! Structured error reports
//!
//! An [`ErrorReport`] is built by whichever component failed and handed to
//! [`crate::ResilienceEngine::report`]. Reports are immutable once built.

use chrono::{DateTime, Utc};
use sentinel_core::validation::{Validate, Violations};
use sentinel_trace::{Metadata, TelemetryLevel};
use serde::{Deserialize, Serialize};

use super::codes::ErrorCode;

/// Default message key when the reporter does not name the failure class
pub const DEFAULT_MESSAGE_KEY: &str = "sentinel.fault";

/// Report severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// LOW/MEDIUM are logged as warnings, HIGH/CRITICAL as errors
    pub fn telemetry_level(&self) -> TelemetryLevel {
        match self {
            Severity::Low | Severity::Medium => TelemetryLevel::Warning,
            Severity::High | Severity::Critical => TelemetryLevel::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// A classified failure, ready for emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub severity: Severity,
    pub apparatus: String,
    pub operation: String,
    /// Human-readable description
    pub message: String,
    /// Machine-readable failure class, used as the telemetry message key
    pub message_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Metadata>,
    pub is_recoverable: bool,
    pub reported_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(
        code: ErrorCode,
        severity: Severity,
        apparatus: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            apparatus: apparatus.into(),
            operation: operation.into(),
            message: message.into(),
            message_key: DEFAULT_MESSAGE_KEY.to_string(),
            context: None,
            is_recoverable: true,
            reported_at: Utc::now(),
        }
    }

    pub fn with_message_key(mut self, message_key: impl Into<String>) -> Self {
        self.message_key = message_key.into();
        self
    }

    pub fn with_context(mut self, context: Metadata) -> Self {
        self.context = Some(context);
        self
    }

    /// Add one context entry, creating the map on first use
    pub fn with_context_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Mark the failure as one the process cannot continue past
    pub fn unrecoverable(mut self) -> Self {
        self.is_recoverable = false;
        self
    }

    /// CRITICAL and unrecoverable: the owning process boundary should halt
    pub fn is_terminal(&self) -> bool {
        self.severity == Severity::Critical && !self.is_recoverable
    }

    /// Flatten into telemetry metadata
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("code".into(), self.code.as_str().into());
        metadata.insert("severity".into(), self.severity.as_str().into());
        metadata.insert("message".into(), self.message.clone().into());
        metadata.insert("is_recoverable".into(), self.is_recoverable.into());
        metadata.insert("reported_at".into(), self.reported_at.to_rfc3339().into());
        if let Some(context) = &self.context {
            metadata.insert("context".into(), serde_json::Value::Object(context.clone()));
        }
        metadata
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"code\":{:?},\"unserializable\":{:?}}}", self.code.as_str(), e.to_string()))
    }
}

impl Validate for ErrorReport {
    fn check(&self, v: &mut Violations) {
        v.require(
            "code",
            self.code.is_well_formed(),
            format!("'{}' does not follow OS-<DOMAIN>-<digits>", self.code),
        );
        v.non_empty("apparatus", &self.apparatus);
        v.non_empty("operation", &self.operation);
        v.non_empty("message", &self.message);
        v.non_empty("message_key", &self.message_key);
    }
}

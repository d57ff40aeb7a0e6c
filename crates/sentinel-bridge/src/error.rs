//! Bridge errors and their fault classes

use sentinel_core::SchemaViolationError;
use sentinel_resilience::{codes, CircuitOpenError, Classify, ErrorCode, FaultClass, ResilienceError, Severity};
use thiserror::Error;

pub const TIMEOUT_KEY: &str = "bridge.request.timeout";
pub const UNREACHABLE_KEY: &str = "bridge.request.unreachable";
pub const REJECTED_KEY: &str = "bridge.request.rejected";
pub const MALFORMED_RESPONSE_KEY: &str = "bridge.response.malformed";
pub const INVALID_REQUEST_KEY: &str = "bridge.request.invalid";
pub const INVALID_CONFIG_KEY: &str = "bridge.config.invalid";

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("request to {endpoint} failed: {message}")]
    Connectivity { endpoint: String, message: String },

    #[error("{endpoint} answered with status {status}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("bridge configuration invalid: {0}")]
    Configuration(#[from] SchemaViolationError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
}

impl BridgeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Classify for BridgeError {
    /// Timeouts, connectivity failures, 429 and 5xx are transient
    fn fault_class(&self) -> FaultClass {
        match self {
            BridgeError::Timeout { .. }
            | BridgeError::Connectivity { .. }
            | BridgeError::CircuitOpen(_) => FaultClass::Transient,
            BridgeError::Status { status, .. } if *status == 429 || *status >= 500 => {
                FaultClass::Transient
            }
            BridgeError::Status { .. }
            | BridgeError::Decode { .. }
            | BridgeError::InvalidRequest(_)
            | BridgeError::Configuration(_) => FaultClass::Fatal,
        }
    }

    fn error_code(&self) -> Option<ErrorCode> {
        Some(match self {
            BridgeError::Timeout { .. } => codes::NET_TIMEOUT,
            BridgeError::Connectivity { .. } => codes::NET_UNREACHABLE,
            BridgeError::Status { .. } => codes::NET_BAD_STATUS,
            BridgeError::Decode { .. } => codes::NET_BAD_PAYLOAD,
            BridgeError::InvalidRequest(_) => codes::SCHEMA_VIOLATION,
            BridgeError::Configuration(_) => codes::INVALID_CONFIGURATION,
            BridgeError::CircuitOpen(_) => codes::CIRCUIT_OPEN,
        })
    }

    fn message_key(&self) -> Option<&'static str> {
        Some(match self {
            BridgeError::Timeout { .. } => TIMEOUT_KEY,
            BridgeError::Connectivity { .. } => UNREACHABLE_KEY,
            BridgeError::Status { .. } => REJECTED_KEY,
            BridgeError::Decode { .. } => MALFORMED_RESPONSE_KEY,
            BridgeError::InvalidRequest(_) => INVALID_REQUEST_KEY,
            BridgeError::Configuration(_) => INVALID_CONFIG_KEY,
            BridgeError::CircuitOpen(_) => sentinel_resilience::CIRCUIT_OPEN_KEY,
        })
    }

    fn severity(&self) -> Option<Severity> {
        match self {
            BridgeError::Configuration(_) => Some(Severity::Critical),
            BridgeError::CircuitOpen(_) => Some(Severity::Low),
            _ => None,
        }
    }
}

impl From<ResilienceError<BridgeError>> for BridgeError {
    fn from(err: ResilienceError<BridgeError>) -> Self {
        match err {
            ResilienceError::CircuitOpen(open) => BridgeError::CircuitOpen(open),
            ResilienceError::Operation(e) => e,
        }
    }
}

//! Stable error codes
//!
//! Codes follow `OS-<DOMAIN>-<digits>` and never change meaning once
//! published; log pipelines and alert rules match on them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// A stable error identifier such as `OS-NET-002`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(Cow<'static, str>);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed error code '{0}', expected OS-<DOMAIN>-<digits>")]
pub struct MalformedErrorCode(pub String);

fn matches_convention(code: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^OS-[A-Z]+-[0-9]+$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(code))
}

impl ErrorCode {
    /// Wrap a compile-time code; format is checked by [`ErrorCode::is_well_formed`]
    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    /// Parse a runtime code, rejecting anything off-convention
    pub fn parse(code: impl Into<String>) -> Result<Self, MalformedErrorCode> {
        let code = code.into();
        if matches_convention(&code) {
            Ok(Self(Cow::Owned(code)))
        } else {
            Err(MalformedErrorCode(code))
        }
    }

    pub fn is_well_formed(&self) -> bool {
        matches_convention(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `<DOMAIN>` segment
    pub fn domain(&self) -> Option<&str> {
        self.0.split('-').nth(1)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generic connectivity failure (refused, reset, DNS)
pub const NET_UNREACHABLE: ErrorCode = ErrorCode::from_static("OS-NET-001");
/// Outbound call cut off by its deadline
pub const NET_TIMEOUT: ErrorCode = ErrorCode::from_static("OS-NET-002");
/// Remote answered with a non-success status
pub const NET_BAD_STATUS: ErrorCode = ErrorCode::from_static("OS-NET-003");
/// Remote answered with a body that could not be decoded
pub const NET_BAD_PAYLOAD: ErrorCode = ErrorCode::from_static("OS-NET-004");
/// Transient failure that outlived the retry ceiling
pub const RETRIES_EXHAUSTED: ErrorCode = ErrorCode::from_static("OS-RES-001");
/// Call rejected by an open circuit
pub const CIRCUIT_OPEN: ErrorCode = ErrorCode::from_static("OS-RES-002");
/// Non-retryable failure
pub const FATAL_FAULT: ErrorCode = ErrorCode::from_static("OS-RES-003");
/// Missing or malformed configuration
pub const INVALID_CONFIGURATION: ErrorCode = ErrorCode::from_static("OS-CFG-001");
/// Data failed its schema
pub const SCHEMA_VIOLATION: ErrorCode = ErrorCode::from_static("OS-VAL-001");
/// A heartbeat probe could not reach its dependency
pub const PROBE_FAILED: ErrorCode = ErrorCode::from_static("OS-HEALTH-001");
/// A consolidated health report failed validation
pub const INVALID_HEALTH_REPORT: ErrorCode = ErrorCode::from_static("OS-HEALTH-002");

//! Fault classification and engine errors

use std::fmt;
use std::io;
use std::time::Duration;

use sentinel_core::SchemaViolationError;
use thiserror::Error;

use super::circuit::CircuitKey;
use super::codes::{self, ErrorCode};
use super::report::Severity;

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Network/timeout class; retried up to the attempt ceiling
    Transient,
    /// Validation, configuration or programmer error; never retried
    Fatal,
}

impl FaultClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultClass::Transient => "transient",
            FaultClass::Fatal => "fatal",
        }
    }
}

/// Errors that can tell the engine how to treat them
///
/// Only [`Classify::fault_class`] is required. The other hooks let an error
/// name the code, message key and severity of the report the engine derives
/// when it gives up; the engine falls back to generic values otherwise.
pub trait Classify {
    fn fault_class(&self) -> FaultClass;

    fn error_code(&self) -> Option<ErrorCode> {
        None
    }

    fn message_key(&self) -> Option<&'static str> {
        None
    }

    fn severity(&self) -> Option<Severity> {
        None
    }
}

impl Classify for SchemaViolationError {
    fn fault_class(&self) -> FaultClass {
        FaultClass::Fatal
    }

    fn error_code(&self) -> Option<ErrorCode> {
        Some(codes::SCHEMA_VIOLATION)
    }

    fn message_key(&self) -> Option<&'static str> {
        Some("sentinel.schema.violation")
    }
}

impl Classify for io::Error {
    fn fault_class(&self) -> FaultClass {
        match self.kind() {
            io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::UnexpectedEof => FaultClass::Transient,
            _ => FaultClass::Fatal,
        }
    }

    fn error_code(&self) -> Option<ErrorCode> {
        match self.kind() {
            io::ErrorKind::TimedOut => Some(codes::NET_TIMEOUT),
            _ if self.fault_class() == FaultClass::Transient => Some(codes::NET_UNREACHABLE),
            _ => None,
        }
    }
}

/// A call refused by an open circuit without reaching the operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("circuit open for {key}, next probe in {}ms", .retry_after.as_millis())]
pub struct CircuitOpenError {
    pub key: CircuitKey,
    pub retry_after: Duration,
}

/// Failure surfaced by [`crate::ResilienceEngine::execute_with_resilience`]
#[derive(Error, Debug)]
pub enum ResilienceError<E> {
    /// Rejected locally, the operation was not invoked
    #[error(transparent)]
    CircuitOpen(CircuitOpenError),

    /// The operation's own final error, unchanged
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }

    /// The operation's error, if the operation ran
    pub fn into_operation(self) -> Option<E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            ResilienceError::CircuitOpen(_) => None,
        }
    }

    pub fn as_operation(&self) -> Option<&E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            ResilienceError::CircuitOpen(_) => None,
        }
    }
}

impl<E: Classify> Classify for ResilienceError<E> {
    fn fault_class(&self) -> FaultClass {
        match self {
            ResilienceError::CircuitOpen(_) => FaultClass::Transient,
            ResilienceError::Operation(e) => e.fault_class(),
        }
    }

    fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ResilienceError::CircuitOpen(_) => Some(codes::CIRCUIT_OPEN),
            ResilienceError::Operation(e) => e.error_code(),
        }
    }
}

/// Plain fault for callers without their own error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("transient fault: {0}")]
    Transient(String),

    #[error("fatal fault: {0}")]
    Fatal(String),
}

impl Fault {
    pub fn transient(msg: impl fmt::Display) -> Self {
        Fault::Transient(msg.to_string())
    }

    pub fn fatal(msg: impl fmt::Display) -> Self {
        Fault::Fatal(msg.to_string())
    }
}

impl Classify for Fault {
    fn fault_class(&self) -> FaultClass {
        match self {
            Fault::Transient(_) => FaultClass::Transient,
            Fault::Fatal(_) => FaultClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(timeout.fault_class(), FaultClass::Transient);
        assert_eq!(timeout.error_code(), Some(codes::NET_TIMEOUT));

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "no");
        assert_eq!(refused.error_code(), Some(codes::NET_UNREACHABLE));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert_eq!(denied.fault_class(), FaultClass::Fatal);
        assert_eq!(denied.error_code(), None);
    }

    #[test]
    fn test_schema_violation_is_fatal() {
        let err = SchemaViolationError {
            context: "x".into(),
            violations: vec![],
        };
        assert_eq!(err.fault_class(), FaultClass::Fatal);
    }

    #[test]
    fn test_circuit_open_display() {
        let err: ResilienceError<Fault> = ResilienceError::CircuitOpen(CircuitOpenError {
            key: CircuitKey::new("Bridge", "/v1/send"),
            retry_after: Duration::from_millis(1500),
        });
        assert!(err.is_circuit_open());
        assert_eq!(err.to_string(), "circuit open for Bridge::/v1/send, next probe in 1500ms");
        assert!(err.into_operation().is_none());
    }

    #[test]
    fn test_operation_error_passes_through() {
        let err: ResilienceError<Fault> = ResilienceError::Operation(Fault::fatal("bad input"));
        assert_eq!(err.to_string(), "fatal fault: bad input");
        assert_eq!(err.fault_class(), FaultClass::Fatal);
        assert_eq!(err.into_operation(), Some(Fault::Fatal("bad input".into())));
    }
}

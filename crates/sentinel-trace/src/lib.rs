//! Sentinel execution tracing
//!
//! Structured telemetry for every platform component: the
//! [`TraceRecorder`] wraps work in `trace_execution`, emits one entry per
//! execution, and funnels every entry through a validating `emit` step that
//! can never fail its caller.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sentinel_trace::{MemorySink, TraceRecorder};
//!
//! # async fn run() {
//! let sink = MemorySink::new();
//! let recorder = TraceRecorder::new(Arc::new(sink.clone()));
//!
//! let value: Result<u32, std::io::Error> = recorder
//!     .trace_execution("WhatsAppDriver", "send_message", || async { Ok(7) }, None)
//!     .await;
//! assert_eq!(value.unwrap(), 7);
//! assert_eq!(sink.len(), 1);
//! # }
//! ```

pub mod diagnostics;
pub mod entry;
pub mod logging;
pub mod recorder;
pub mod sink;

pub use diagnostics::{DiagnosticRecord, DiagnosticSink, MemoryDiagnostics, StderrDiagnostics};
pub use entry::{ExecutionStatus, Metadata, TelemetryEntry, TelemetryLevel};
pub use logging::{init_logging, LogFormat, LoggingError};
pub use recorder::{TraceRecorder, VerbosityFlag, EXECUTION_COMPLETED_KEY, EXECUTION_FAILED_KEY};
pub use sink::{FanoutSink, MemorySink, TelemetrySink, TracingSink};

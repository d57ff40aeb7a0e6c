//! Execution tracing wrapper
//!
//! [`TraceRecorder`] observes work, it never recovers it: results and errors
//! pass through `trace_execution` unchanged while exactly one entry is
//! emitted per execution. Every entry goes through [`TraceRecorder::emit`],
//! which validates it and degrades to the diagnostic channel instead of
//! failing.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sentinel_core::validation::Validate;
use tracing::Instrument;
use uuid::Uuid;

use super::diagnostics::{DiagnosticSink, StderrDiagnostics};
use super::entry::{ExecutionStatus, Metadata, TelemetryEntry, TelemetryLevel};
use super::sink::{TelemetrySink, TracingSink};

/// Message key of the PERFORMANCE entry emitted for a successful execution
pub const EXECUTION_COMPLETED_KEY: &str = "execution.completed";

/// Message key of the ERROR entry emitted for a failed execution
pub const EXECUTION_FAILED_KEY: &str = "execution.failed";

/// Shared on/off switch for verbose entries
#[derive(Debug, Clone)]
pub struct VerbosityFlag(Arc<AtomicBool>);

impl Default for VerbosityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VerbosityFlag {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    /// `SENTINEL_VERBOSE=0|false|off` disables verbose output
    pub fn from_env() -> Self {
        let enabled = std::env::var("SENTINEL_VERBOSE")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(true);
        Self::new(enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

/// Formats and emits structured execution entries
#[derive(Clone)]
pub struct TraceRecorder {
    sink: Arc<dyn TelemetrySink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    verbosity: VerbosityFlag,
}

impl fmt::Debug for TraceRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceRecorder")
            .field("verbose", &self.verbosity.is_enabled())
            .finish()
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            diagnostics: Arc::new(StderrDiagnostics),
            verbosity: VerbosityFlag::from_env(),
        }
    }
}

impl TraceRecorder {
    /// Recorder writing to `sink`, with stderr diagnostics and verbose output on
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink,
            diagnostics: Arc::new(StderrDiagnostics),
            verbosity: VerbosityFlag::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_verbosity(mut self, verbosity: VerbosityFlag) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn verbosity(&self) -> &VerbosityFlag {
        &self.verbosity
    }

    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticSink> {
        &self.diagnostics
    }

    /// Run `work`, time it, and emit one entry describing the outcome
    ///
    /// On success a PERFORMANCE entry with status COMPLETED is emitted and
    /// the value is returned unchanged. On failure an ERROR entry with status
    /// FAILED, the error message and its debug rendering is emitted and the
    /// original error is returned unchanged. A panic inside `work` unwinds
    /// through this call without an entry.
    pub async fn trace_execution<F, Fut, T, E>(
        &self,
        apparatus: &str,
        operation: &str,
        work: F,
        metadata: Option<Metadata>,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let trace_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "trace_execution",
            apparatus = %apparatus,
            operation = %operation,
            trace_id = %trace_id,
        );

        let started = Instant::now();
        let outcome = work().instrument(span).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let entry = match &outcome {
            Ok(_) => TelemetryEntry::new(
                apparatus,
                operation,
                TelemetryLevel::Performance,
                EXECUTION_COMPLETED_KEY,
            )
            .with_status(ExecutionStatus::Completed),
            Err(e) => TelemetryEntry::new(
                apparatus,
                operation,
                TelemetryLevel::Error,
                EXECUTION_FAILED_KEY,
            )
            .with_status(ExecutionStatus::Failed)
            .with_error(e.to_string(), Some(format!("{:?}", e))),
        };

        self.emit(
            entry
                .with_duration_ms(duration_ms)
                .with_metadata(metadata)
                .with_trace_id(trace_id),
        );

        outcome
    }

    /// Emit a VERBOSE entry unless verbosity is disabled
    pub fn verbose(
        &self,
        apparatus: &str,
        operation: &str,
        message_key: &str,
        metadata: Option<Metadata>,
    ) {
        if !self.verbosity.is_enabled() {
            return;
        }
        self.log(TelemetryLevel::Verbose, apparatus, operation, message_key, metadata);
    }

    pub fn information(
        &self,
        apparatus: &str,
        operation: &str,
        message_key: &str,
        metadata: Option<Metadata>,
    ) {
        self.log(TelemetryLevel::Information, apparatus, operation, message_key, metadata);
    }

    pub fn warning(
        &self,
        apparatus: &str,
        operation: &str,
        message_key: &str,
        metadata: Option<Metadata>,
    ) {
        self.log(TelemetryLevel::Warning, apparatus, operation, message_key, metadata);
    }

    /// Build and emit an entry at `level`
    pub fn log(
        &self,
        level: TelemetryLevel,
        apparatus: &str,
        operation: &str,
        message_key: &str,
        metadata: Option<Metadata>,
    ) {
        self.emit(TelemetryEntry::new(apparatus, operation, level, message_key).with_metadata(metadata));
    }

    /// Validate and write an entry; never fails
    pub fn emit(&self, entry: TelemetryEntry) {
        if let Err(violation) = entry.validate_ref("TelemetryEntry") {
            self.diagnostics.raw(
                "TraceRecorder::emit",
                &format!("{} | {}", violation, entry.to_json_line()),
            );
            return;
        }

        let sink = &self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.write(&entry))).is_err() {
            self.diagnostics
                .raw("TraceRecorder::emit sink panicked", &entry.to_json_line());
        }
    }
}

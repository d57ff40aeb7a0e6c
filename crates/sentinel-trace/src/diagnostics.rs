//! Last-resort diagnostic channel
//!
//! When the observability layer cannot trust its own data (an entry or a
//! report failed shape validation) it writes the raw payload here instead
//! of dropping it. Writes must never fail or panic.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Raw, unstructured fallback output
pub trait DiagnosticSink: Send + Sync {
    /// `context` names the failing step, `detail` carries the raw payload
    fn raw(&self, context: &str, detail: &str);
}

/// Writes straight to stderr, bypassing the `tracing` pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn raw(&self, context: &str, detail: &str) {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(handle, "[sentinel-diagnostic] {}: {}", context, detail);
    }
}

/// A captured diagnostic write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub context: String,
    pub detail: String,
}

/// Captures diagnostic writes in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryDiagnostics {
    records: Arc<Mutex<Vec<DiagnosticRecord>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn raw(&self, context: &str, detail: &str) {
        let record = DiagnosticRecord {
            context: context.to_string(),
            detail: detail.to_string(),
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

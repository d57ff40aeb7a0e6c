//! Telemetry sinks
//!
//! A sink receives entries that already passed shape validation. The
//! default [`TracingSink`] forwards them to the `tracing` subscriber with
//! structured fields; [`MemorySink`] buffers them for inspection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::entry::{TelemetryEntry, TelemetryLevel};

/// Destination for validated telemetry entries
pub trait TelemetrySink: Send + Sync {
    fn write(&self, entry: &TelemetryEntry);
}

/// Forwards entries to the active `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn write(&self, entry: &TelemetryEntry) {
        let metadata = entry
            .metadata
            .as_ref()
            .map(|m| serde_json::Value::Object(m.clone()).to_string());
        let trace_id = entry.trace_id.map(|id| id.to_string());

        macro_rules! emit {
            ($macro:ident) => {
                tracing::$macro!(
                    target: "sentinel::telemetry",
                    apparatus = %entry.apparatus,
                    operation = %entry.operation,
                    telemetry_level = entry.level.as_str(),
                    duration_ms = entry.duration_ms,
                    status = ?entry.status,
                    error = entry.error.as_deref(),
                    stack = entry.stack.as_deref(),
                    metadata = metadata.as_deref(),
                    trace_id = trace_id.as_deref(),
                    "{}",
                    entry.message_key
                )
            };
        }

        match entry.level {
            TelemetryLevel::Error => emit!(error),
            TelemetryLevel::Warning => emit!(warn),
            TelemetryLevel::Information | TelemetryLevel::Performance => emit!(info),
            TelemetryLevel::Verbose => emit!(debug),
        }
    }
}

const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded in-memory buffer of entries, oldest evicted first
#[derive(Debug, Clone)]
pub struct MemorySink {
    buffer: Arc<Mutex<VecDeque<TelemetryEntry>>>,
    capacity: usize,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    /// Copy of everything currently buffered, oldest first
    pub fn entries(&self) -> Vec<TelemetryEntry> {
        match self.buffer.lock() {
            Ok(buffer) => buffer.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn entries_at(&self, level: TelemetryLevel) -> Vec<TelemetryEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }
}

impl TelemetrySink for MemorySink {
    fn write(&self, entry: &TelemetryEntry) {
        let mut buffer = match self.buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry.clone());
    }
}

/// Writes every entry to each inner sink in order
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl TelemetrySink for FanoutSink {
    fn write(&self, entry: &TelemetryEntry) {
        for sink in &self.sinks {
            sink.write(entry);
        }
    }
}

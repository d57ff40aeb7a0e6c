//! Prometheus metrics for the resilience engine
//!
//! - `sentinel_resilience_attempts_total` (counter) - operation attempts by outcome
//! - `sentinel_resilience_retries_total` (counter) - retries scheduled after a transient fault
//! - `sentinel_resilience_circuit_transitions_total` (counter) - phase changes
//! - `sentinel_resilience_circuit_rejections_total` (counter) - calls refused by an open circuit
//! - `sentinel_resilience_reports_total` (counter) - error reports by severity and outcome
//! - `sentinel_resilience_backoff_seconds` (histogram) - backoff delays slept

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

use super::circuit::Transition;
use super::report::Severity;

/// Counters registered in a caller-supplied registry
#[derive(Debug, Clone)]
pub struct ResilienceMetrics {
    attempts_total: CounterVec,
    retries_total: CounterVec,
    transitions_total: CounterVec,
    rejections_total: CounterVec,
    reports_total: CounterVec,
    backoff_seconds: HistogramVec,
}

impl ResilienceMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let attempts_total = CounterVec::new(
            Opts::new("attempts_total", "Operation attempts made through the engine")
                .namespace("sentinel")
                .subsystem("resilience"),
            &["apparatus", "operation", "outcome"],
        )?;

        let retries_total = CounterVec::new(
            Opts::new("retries_total", "Retries scheduled after a transient fault")
                .namespace("sentinel")
                .subsystem("resilience"),
            &["apparatus", "operation"],
        )?;

        let transitions_total = CounterVec::new(
            Opts::new("circuit_transitions_total", "Circuit breaker phase changes")
                .namespace("sentinel")
                .subsystem("resilience"),
            &["apparatus", "operation", "from", "to"],
        )?;

        let rejections_total = CounterVec::new(
            Opts::new("circuit_rejections_total", "Calls refused by an open circuit")
                .namespace("sentinel")
                .subsystem("resilience"),
            &["apparatus", "operation"],
        )?;

        let reports_total = CounterVec::new(
            Opts::new("reports_total", "Error reports handled by the engine")
                .namespace("sentinel")
                .subsystem("resilience"),
            &["severity", "outcome"],
        )?;

        let backoff_seconds = HistogramVec::new(
            HistogramOpts::new("backoff_seconds", "Backoff delay slept before a retry")
                .namespace("sentinel")
                .subsystem("resilience")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["apparatus"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(reports_total.clone()))?;
        registry.register(Box::new(backoff_seconds.clone()))?;

        Ok(Self {
            attempts_total,
            retries_total,
            transitions_total,
            rejections_total,
            reports_total,
            backoff_seconds,
        })
    }

    pub fn record_attempt(&self, apparatus: &str, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.attempts_total
            .with_label_values(&[apparatus, operation, outcome])
            .inc();
    }

    pub fn record_retry(&self, apparatus: &str, operation: &str, delay_secs: f64) {
        self.retries_total
            .with_label_values(&[apparatus, operation])
            .inc();
        self.backoff_seconds
            .with_label_values(&[apparatus])
            .observe(delay_secs);
    }

    pub fn record_transition(&self, apparatus: &str, operation: &str, transition: &Transition) {
        self.transitions_total
            .with_label_values(&[
                apparatus,
                operation,
                transition.from.as_str(),
                transition.to.as_str(),
            ])
            .inc();
    }

    pub fn record_rejection(&self, apparatus: &str, operation: &str) {
        self.rejections_total
            .with_label_values(&[apparatus, operation])
            .inc();
    }

    pub fn record_report(&self, severity: Severity, outcome: &str) {
        self.reports_total
            .with_label_values(&[severity.as_str(), outcome])
            .inc();
    }
}

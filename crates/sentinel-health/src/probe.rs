//! Heartbeat probe contract
//!
//! A probe performs one bounded-time check against one backing service.
//! [`run_probe`] owns the time bound, the latency budget and the conversion
//! of any failure into an UNREACHABLE record.

use std::time::Duration;

use async_trait::async_trait;
use sentinel_resilience::{codes, ErrorReport, ResilienceEngine, Severity};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use super::record::HeartbeatRecord;

/// Default time bound of one probe run
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Message key of the report emitted for a failed probe
pub const PROBE_FAILED_KEY: &str = "health.probe.failed";

/// Why a probe could not reach its dependency
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unhealthy status: {0}")]
    Status(u16),

    #[error("liveness check failed: {0}")]
    Liveness(String),

    #[error("invalid probe target: {0}")]
    InvalidTarget(String),
}

/// A successful check that may still be impaired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive,
    /// Reachable but not fully healthy
    Impaired(String),
}

/// One bounded-time connectivity check
#[async_trait]
pub trait HeartbeatProbe: Send + Sync {
    /// Component name; unique within an orchestrator
    fn name(&self) -> &str;

    fn timeout(&self) -> Duration {
        DEFAULT_PROBE_TIMEOUT
    }

    /// Latency above which a successful check counts as DEGRADED
    fn latency_budget(&self) -> Option<Duration> {
        None
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeError>;
}

/// Run `probe` once and turn the outcome into a record
///
/// Errors and timeouts become UNREACHABLE with latency 0 and are reported
/// through `engine` at MEDIUM severity. A check slower than its latency
/// budget is DEGRADED.
pub async fn run_probe(probe: &dyn HeartbeatProbe, engine: &ResilienceEngine) -> HeartbeatRecord {
    let name = probe.name();
    let bound = probe.timeout();
    let started = Instant::now();

    let outcome = match tokio::time::timeout(bound, probe.check()).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProbeError::Timeout(bound)),
    };
    let elapsed = started.elapsed();
    let latency_ms = elapsed.as_secs_f64() * 1000.0;

    debug!(probe = %name, latency_ms, ok = outcome.is_ok(), "Probe finished");

    match outcome {
        Ok(ProbeOutcome::Alive) => match probe.latency_budget() {
            Some(budget) if elapsed > budget => HeartbeatRecord::degraded(
                name,
                latency_ms,
                format!("latency {:.1}ms over budget {}ms", latency_ms, budget.as_millis()),
            ),
            _ => HeartbeatRecord::healthy(name, latency_ms),
        },
        Ok(ProbeOutcome::Impaired(reason)) => HeartbeatRecord::degraded(name, latency_ms, reason),
        Err(error) => {
            engine.report(
                ErrorReport::new(
                    codes::PROBE_FAILED,
                    Severity::Medium,
                    "HeartbeatProbe",
                    name,
                    error.to_string(),
                )
                .with_message_key(PROBE_FAILED_KEY)
                .with_context_value("timeout_ms", bound.as_millis() as u64),
            );
            HeartbeatRecord::unreachable(name, error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::HeartbeatStatus;
    use sentinel_trace::{MemorySink, TelemetryLevel, TraceRecorder};
    use std::sync::Arc;

    struct SleepyProbe {
        delay: Duration,
        budget: Option<Duration>,
    }

    #[async_trait]
    impl HeartbeatProbe for SleepyProbe {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        fn latency_budget(&self) -> Option<Duration> {
            self.budget
        }

        async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
            tokio::time::sleep(self.delay).await;
            Ok(ProbeOutcome::Alive)
        }
    }

    fn engine() -> (ResilienceEngine, MemorySink) {
        let sink = MemorySink::new();
        (ResilienceEngine::new(TraceRecorder::new(Arc::new(sink.clone()))), sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_unreachable_and_is_reported() {
        let (engine, sink) = engine();
        let probe = SleepyProbe {
            delay: Duration::from_secs(5),
            budget: None,
        };

        let record = run_probe(&probe, &engine).await;

        assert_eq!(record.status, HeartbeatStatus::Unreachable);
        assert_eq!(record.latency_ms, 0.0);
        assert_eq!(record.error.as_deref(), Some("probe timed out after 100ms"));

        let warnings = sink.entries_at(TelemetryLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message_key, PROBE_FAILED_KEY);
        assert_eq!(warnings[0].metadata.as_ref().unwrap()["severity"], "MEDIUM");
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_budget_is_degraded() {
        let (engine, sink) = engine();
        let probe = SleepyProbe {
            delay: Duration::from_millis(50),
            budget: Some(Duration::from_millis(10)),
        };

        let record = run_probe(&probe, &engine).await;

        assert_eq!(record.status, HeartbeatStatus::Degraded);
        assert!(record.latency_ms >= 50.0);
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_budget_is_healthy() {
        let (engine, _) = engine();
        let probe = SleepyProbe {
            delay: Duration::from_millis(5),
            budget: Some(Duration::from_millis(10)),
        };

        assert_eq!(run_probe(&probe, &engine).await.status, HeartbeatStatus::Healthy);
    }
}

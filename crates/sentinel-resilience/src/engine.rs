//! The resilience engine
//!
//! [`ResilienceEngine`] is the only component allowed to retry. It keeps one
//! circuit per (apparatus, operation), retries transient faults with jittered
//! exponential backoff, and turns final failures into [`ErrorReport`]s that
//! are emitted through the [`TraceRecorder`].

use std::fmt;
use std::future::Future;

use sentinel_core::validation::Validate;
use sentinel_trace::TraceRecorder;
use tracing::{debug, warn};

use super::circuit::{Admission, CircuitKey, CircuitState, CircuitStore, Transition};
use super::codes;
use super::fault::{CircuitOpenError, Classify, FaultClass, ResilienceError};
use super::metrics::ResilienceMetrics;
use super::policy::ResiliencePolicy;
use super::report::{ErrorReport, Severity};

/// Message key for calls refused by an open circuit
pub const CIRCUIT_OPEN_KEY: &str = "sentinel.circuit.open";
/// Message key for transient faults that outlived the retry ceiling
pub const RETRIES_EXHAUSTED_KEY: &str = "sentinel.retries.exhausted";
/// Message key for fatal faults without a key of their own
pub const FATAL_FAULT_KEY: &str = "sentinel.fault.fatal";

/// What happened to a report handed to [`ResilienceEngine::report`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Emitted through the recorder
    Recorded,
    /// Failed validation and went to the diagnostic channel
    Diverted,
    /// CRITICAL and unrecoverable; the owning process boundary should halt
    Terminal,
}

impl ReportOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportOutcome::Terminal)
    }

    fn as_str(&self) -> &'static str {
        match self {
            ReportOutcome::Recorded => "recorded",
            ReportOutcome::Diverted => "diverted",
            ReportOutcome::Terminal => "terminal",
        }
    }
}

/// Retry, circuit-breaking and reporting engine
pub struct ResilienceEngine {
    recorder: TraceRecorder,
    policy: ResiliencePolicy,
    circuits: CircuitStore,
    metrics: Option<ResilienceMetrics>,
}

impl fmt::Debug for ResilienceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceEngine")
            .field("policy", &self.policy)
            .field("circuits", &self.circuits.len())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl ResilienceEngine {
    /// Engine with the default policy and an empty circuit store
    pub fn new(recorder: TraceRecorder) -> Self {
        Self {
            recorder,
            policy: ResiliencePolicy::default(),
            circuits: CircuitStore::new(),
            metrics: None,
        }
    }

    pub fn with_policy(mut self, policy: ResiliencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn recorder(&self) -> &TraceRecorder {
        &self.recorder
    }

    pub fn policy(&self) -> &ResiliencePolicy {
        &self.policy
    }

    /// Snapshot of the circuit for (apparatus, operation)
    pub fn circuit_state(&self, apparatus: &str, operation: &str) -> CircuitState {
        self.circuits.snapshot(&CircuitKey::new(apparatus, operation))
    }

    /// Snapshot of every circuit that has seen a failure
    pub fn circuits(&self) -> Vec<(CircuitKey, CircuitState)> {
        self.circuits.snapshot_all()
    }

    /// Run `operation` under the circuit for (apparatus, operation_name)
    ///
    /// `operation` is invoked once per attempt. Transient failures are
    /// retried up to `policy.max_attempts` total attempts, sleeping a
    /// jittered exponential delay in between; fatal failures end the call at
    /// once. A final failure counts once against the circuit and is reported
    /// before the operation's own error is returned. A HALF_OPEN probe gets
    /// a single attempt.
    ///
    /// `policy` overrides the engine policy for this call only.
    pub async fn execute_with_resilience<T, E, F, Fut>(
        &self,
        mut operation: F,
        apparatus: &str,
        operation_name: &str,
        policy: Option<&ResiliencePolicy>,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let policy = policy.unwrap_or(&self.policy);
        let key = CircuitKey::new(apparatus, operation_name);

        let (admission, transition) = self.circuits.admit(&key, policy);
        if let Some(transition) = transition {
            self.on_transition(&key, &transition);
        }

        let probe = match admission {
            Admission::Allowed { probe } => probe,
            Admission::Rejected { retry_after } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(apparatus, operation_name);
                }
                let rejection = CircuitOpenError {
                    key: key.clone(),
                    retry_after,
                };
                self.report(
                    ErrorReport::new(
                        codes::CIRCUIT_OPEN,
                        Severity::Low,
                        apparatus,
                        operation_name,
                        rejection.to_string(),
                    )
                    .with_message_key(CIRCUIT_OPEN_KEY)
                    .with_context_value("retry_after_ms", retry_after.as_millis() as u64),
                );
                return Err(ResilienceError::CircuitOpen(rejection));
            }
        };

        let max_attempts = if probe { 1 } else { policy.max_attempts.max(1) };
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let outcome = operation().await;

            if let Some(metrics) = &self.metrics {
                metrics.record_attempt(apparatus, operation_name, outcome.is_ok());
            }

            let error = match outcome {
                Ok(value) => {
                    if let Some(transition) = self.circuits.record_success(&key) {
                        self.on_transition(&key, &transition);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = error.fault_class();
            if class == FaultClass::Transient && attempt < max_attempts {
                let delay = {
                    let mut rng = rand::thread_rng();
                    policy.backoff_delay(attempt - 1, &mut rng)
                };
                debug!(
                    apparatus = %apparatus,
                    operation = %operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_retry(apparatus, operation_name, delay.as_secs_f64());
                }
                tokio::time::sleep(delay).await;
                continue;
            }

            if let Some(transition) = self.circuits.record_failure(&key, policy) {
                self.on_transition(&key, &transition);
            }
            let state = self.circuits.snapshot(&key);
            self.report(derive_report(&error, class, &key, attempt, &state));
            return Err(ResilienceError::Operation(error));
        }
    }

    /// Validate and emit a report; never fails
    ///
    /// LOW/MEDIUM reports are logged as warnings, HIGH/CRITICAL as errors.
    /// A report that fails its own validation goes to the diagnostic
    /// channel instead. A CRITICAL unrecoverable report yields
    /// [`ReportOutcome::Terminal`] either way; halting is up to the caller.
    pub fn report(&self, report: ErrorReport) -> ReportOutcome {
        let mut outcome = match report.validate_ref("ErrorReport") {
            Ok(()) => {
                self.recorder.log(
                    report.severity.telemetry_level(),
                    &report.apparatus,
                    &report.operation,
                    &report.message_key,
                    Some(report.to_metadata()),
                );
                ReportOutcome::Recorded
            }
            Err(violation) => {
                self.recorder.diagnostics().raw(
                    "ResilienceEngine::report",
                    &format!("{} | {}", violation, report.to_json_line()),
                );
                ReportOutcome::Diverted
            }
        };

        if report.is_terminal() {
            outcome = ReportOutcome::Terminal;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_report(report.severity, outcome.as_str());
        }
        outcome
    }

    fn on_transition(&self, key: &CircuitKey, transition: &Transition) {
        warn!(
            apparatus = %key.apparatus,
            operation = %key.operation,
            from = %transition.from,
            to = %transition.to,
            consecutive_failures = transition.consecutive_failures,
            "Circuit transition"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(&key.apparatus, &key.operation, transition);
        }
    }
}

fn derive_report<E>(
    error: &E,
    class: FaultClass,
    key: &CircuitKey,
    attempts: u32,
    state: &CircuitState,
) -> ErrorReport
where
    E: Classify + fmt::Display,
{
    let (fallback_code, fallback_key) = match class {
        FaultClass::Transient => (codes::RETRIES_EXHAUSTED, RETRIES_EXHAUSTED_KEY),
        FaultClass::Fatal => (codes::FATAL_FAULT, FATAL_FAULT_KEY),
    };

    ErrorReport::new(
        error.error_code().unwrap_or(fallback_code),
        error.severity().unwrap_or(Severity::High),
        key.apparatus.clone(),
        key.operation.clone(),
        error.to_string(),
    )
    .with_message_key(error.message_key().unwrap_or(fallback_key))
    .with_context_value("attempts", attempts)
    .with_context_value("fault_class", class.as_str())
    .with_context_value("consecutive_failures", state.consecutive_failures)
    .with_context_value("circuit_phase", state.phase.as_str())
}

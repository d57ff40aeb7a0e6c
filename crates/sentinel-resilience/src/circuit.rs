//! Per-operation circuit breaker state
//!
//! One [`CircuitStore`] belongs to one engine. Entries are created lazily on
//! the first failure for a key and are never removed; every transition runs
//! under the DashMap shard lock of its entry.
//!
//! ```text
//! CLOSED --threshold--> OPEN --cool-down--> HALF_OPEN --success--> CLOSED
//!                         ^                     |
//!                         +------failure--------+
//! ```

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use super::policy::ResiliencePolicy;

/// (apparatus, operation) identity of a circuit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CircuitKey {
    pub apparatus: String,
    pub operation: String,
}

impl CircuitKey {
    pub fn new(apparatus: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            apparatus: apparatus.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for CircuitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.apparatus, self.operation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitPhase {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitPhase::Closed => "CLOSED",
            CircuitPhase::Open => "OPEN",
            CircuitPhase::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitState {
    pub phase: CircuitPhase,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    /// OPEN: when a probe may be admitted. HALF_OPEN: when the probe lease expires.
    pub half_open_after: Option<Instant>,
    pub probe_in_flight: bool,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            phase: CircuitPhase::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            half_open_after: None,
            probe_in_flight: false,
        }
    }
}

impl CircuitState {
    fn remaining(&self, now: Instant) -> Duration {
        self.half_open_after
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or_default()
    }

    fn lease_probe(&mut self, now: Instant, cool_down: Duration) {
        self.phase = CircuitPhase::HalfOpen;
        self.probe_in_flight = true;
        self.half_open_after = Some(now + cool_down);
    }
}

/// Whether a call may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed; `probe` is set when this call is the single HALF_OPEN probe
    Allowed { probe: bool },
    /// Refuse without invoking the operation
    Rejected { retry_after: Duration },
}

/// A phase change, returned so the engine can log and count it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitPhase,
    pub to: CircuitPhase,
    pub consecutive_failures: u32,
}

/// Concurrent map of circuit state
#[derive(Debug, Default)]
pub struct CircuitStore {
    circuits: DashMap<CircuitKey, CircuitState>,
}

impl CircuitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a call on `key` may run
    ///
    /// An OPEN circuit whose cool-down elapsed moves to HALF_OPEN and leases
    /// the probe to this caller for one cool-down period. A lease that
    /// expires without an outcome (the probe future was dropped) is handed
    /// to the next caller.
    pub fn admit(&self, key: &CircuitKey, policy: &ResiliencePolicy) -> (Admission, Option<Transition>) {
        let Some(mut state) = self.circuits.get_mut(key) else {
            return (Admission::Allowed { probe: false }, None);
        };
        let now = Instant::now();

        match state.phase {
            CircuitPhase::Closed => (Admission::Allowed { probe: false }, None),
            CircuitPhase::Open if state.remaining(now).is_zero() => {
                state.lease_probe(now, policy.cool_down());
                let transition = Transition {
                    from: CircuitPhase::Open,
                    to: CircuitPhase::HalfOpen,
                    consecutive_failures: state.consecutive_failures,
                };
                (Admission::Allowed { probe: true }, Some(transition))
            }
            CircuitPhase::HalfOpen if !state.probe_in_flight || state.remaining(now).is_zero() => {
                state.lease_probe(now, policy.cool_down());
                (Admission::Allowed { probe: true }, None)
            }
            CircuitPhase::Open | CircuitPhase::HalfOpen => (
                Admission::Rejected {
                    retry_after: state.remaining(now),
                },
                None,
            ),
        }
    }

    /// Reset `key` to CLOSED with a zero counter
    pub fn record_success(&self, key: &CircuitKey) -> Option<Transition> {
        let mut state = self.circuits.get_mut(key)?;
        let from = state.phase;
        *state = CircuitState {
            last_failure_at: state.last_failure_at,
            ..CircuitState::default()
        };
        (from != CircuitPhase::Closed).then_some(Transition {
            from,
            to: CircuitPhase::Closed,
            consecutive_failures: 0,
        })
    }

    /// Count one failed call; open the circuit at the threshold or on a failed probe
    pub fn record_failure(&self, key: &CircuitKey, policy: &ResiliencePolicy) -> Option<Transition> {
        let now = Instant::now();
        let mut state = self.circuits.entry(key.clone()).or_default();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_at = Some(now);

        let from = state.phase;
        let opens = match from {
            CircuitPhase::Closed => state.consecutive_failures >= policy.failure_threshold,
            CircuitPhase::HalfOpen => true,
            CircuitPhase::Open => false,
        };
        if !opens {
            return None;
        }

        state.phase = CircuitPhase::Open;
        state.probe_in_flight = false;
        state.half_open_after = Some(now + policy.cool_down());
        Some(Transition {
            from,
            to: CircuitPhase::Open,
            consecutive_failures: state.consecutive_failures,
        })
    }

    /// Current state of `key`; a key never seen is CLOSED with no failures
    pub fn snapshot(&self, key: &CircuitKey) -> CircuitState {
        self.circuits
            .get(key)
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Every tracked circuit
    pub fn snapshot_all(&self) -> Vec<(CircuitKey, CircuitState)> {
        self.circuits
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

//! Retry and circuit-breaker policy
//!
//! All numeric knobs live here with their defaults: 3 attempts, 100ms base
//! delay doubling per attempt with +/-20% jitter capped at 5s, and a circuit
//! that opens after 5 consecutive failed calls for a 30s cool-down.

use std::time::Duration;

use rand::Rng;
use sentinel_core::validation::{SchemaViolationError, Validate, Violations};
use serde::{Deserialize, Serialize};

/// Retry ceiling, backoff shape and circuit thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResiliencePolicy {
    /// Total attempts per call, including the first
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound of any single backoff delay, in milliseconds
    pub max_delay_ms: u64,

    /// Jitter as a fraction of the exponential delay (0.0 - 1.0)
    pub jitter_ratio: f64,

    /// Consecutive failed calls before the circuit opens
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls, in milliseconds
    pub cool_down_ms: u64,
}

impl Default for ResiliencePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            jitter_ratio: 0.2,
            failure_threshold: 5,
            cool_down_ms: 30_000,
        }
    }
}

impl ResiliencePolicy {
    /// Defaults overridden by `SENTINEL_RETRY_*` / `SENTINEL_CIRCUIT_*`, validated
    pub fn from_env() -> Result<Self, SchemaViolationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ResiliencePolicy::from_env`] over any variable source
    ///
    /// An unset variable keeps its default; a set but unparsable one is a
    /// violation of the matching field.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SchemaViolationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut v = Violations::new();
        let policy = Self {
            max_attempts: v.parse_or(
                "max_attempts",
                lookup("SENTINEL_RETRY_MAX_ATTEMPTS"),
                defaults.max_attempts,
            ),
            base_delay_ms: v.parse_or(
                "base_delay_ms",
                lookup("SENTINEL_RETRY_BASE_DELAY_MS"),
                defaults.base_delay_ms,
            ),
            max_delay_ms: v.parse_or(
                "max_delay_ms",
                lookup("SENTINEL_RETRY_MAX_DELAY_MS"),
                defaults.max_delay_ms,
            ),
            jitter_ratio: v.parse_or(
                "jitter_ratio",
                lookup("SENTINEL_RETRY_JITTER"),
                defaults.jitter_ratio,
            ),
            failure_threshold: v.parse_or(
                "failure_threshold",
                lookup("SENTINEL_CIRCUIT_THRESHOLD"),
                defaults.failure_threshold,
            ),
            cool_down_ms: v.parse_or(
                "cool_down_ms",
                lookup("SENTINEL_CIRCUIT_COOL_DOWN_MS"),
                defaults.cool_down_ms,
            ),
        };
        v.finish(policy, "ResiliencePolicy")
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay_ms = base.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down_ms = cool_down.as_millis() as u64;
        self
    }

    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }

    /// Un-jittered delay before retry number `retry` (0-based): `base * 2^retry`, capped
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.min(63)).unwrap_or(u64::MAX);
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Jittered delay before retry number `retry`, never above `max_delay_ms`
    pub fn backoff_delay<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let factor = 1u64.checked_shl(retry.min(63)).unwrap_or(u64::MAX);
        let exponential = self.base_delay_ms.saturating_mul(factor) as f64;
        let spread = exponential * self.jitter_ratio.clamp(0.0, 1.0);
        let jitter = if spread > 0.0 {
            rng.gen_range(-spread..=spread)
        } else {
            0.0
        };
        let millis = (exponential + jitter).clamp(0.0, self.max_delay_ms as f64);
        Duration::from_secs_f64(millis / 1000.0)
    }
}

impl Validate for ResiliencePolicy {
    fn check(&self, v: &mut Violations) {
        v.in_range("max_attempts", self.max_attempts, 1, 10);
        v.in_range("max_delay_ms", self.max_delay_ms, 0, 300_000);
        v.require(
            "base_delay_ms",
            self.base_delay_ms <= self.max_delay_ms,
            "must not exceed max_delay_ms",
        );
        v.require(
            "jitter_ratio",
            (0.0..=1.0).contains(&self.jitter_ratio),
            "must be within 0.0..=1.0",
        );
        v.in_range("failure_threshold", self.failure_threshold, 1, 1_000);
        v.in_range("cool_down_ms", self.cool_down_ms, 1, 3_600_000);
    }
}

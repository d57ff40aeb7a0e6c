//! Sentinel health orchestration
//!
//! Heartbeat probes check one backing service each within a time bound;
//! the [`HealthOrchestrator`] runs all of them concurrently and folds the
//! records into one [`HealthReport`] with the precedence
//! UNREACHABLE > DEGRADED > HEALTHY.

pub mod config;
pub mod orchestrator;
pub mod probe;
pub mod probes;
pub mod record;

pub use config::ProbeTarget;
pub use orchestrator::{HealthError, HealthOrchestrator, INVALID_REPORT_KEY};
pub use probe::{
    run_probe, HeartbeatProbe, ProbeError, ProbeOutcome, DEFAULT_PROBE_TIMEOUT, PROBE_FAILED_KEY,
};
pub use probes::{DatabaseProbe, HttpProbe, LivenessCheck, LivenessError, TcpProbe};
pub use record::{HealthReport, HeartbeatRecord, HeartbeatStatus};

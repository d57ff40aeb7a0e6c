//! Sentinel resilience engine
//!
//! Retries transient faults, keeps per-operation circuit breakers and turns
//! final failures into structured [`ErrorReport`]s.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sentinel_resilience::{Fault, ResilienceEngine};
//! use sentinel_trace::TraceRecorder;
//!
//! # async fn run() {
//! let engine = ResilienceEngine::new(TraceRecorder::default());
//!
//! let result = engine
//!     .execute_with_resilience(
//!         || async { Ok::<_, Fault>("pong") },
//!         "ErpMock",
//!         "ping",
//!         None,
//!     )
//!     .await;
//! assert_eq!(result.unwrap(), "pong");
//! # }
//! ```

pub mod circuit;
pub mod codes;
pub mod engine;
pub mod fault;
pub mod metrics;
pub mod policy;
pub mod report;

pub use circuit::{Admission, CircuitKey, CircuitPhase, CircuitState, CircuitStore, Transition};
pub use codes::{ErrorCode, MalformedErrorCode};
pub use engine::{
    ReportOutcome, ResilienceEngine, CIRCUIT_OPEN_KEY, FATAL_FAULT_KEY, RETRIES_EXHAUSTED_KEY,
};
pub use fault::{CircuitOpenError, Classify, Fault, FaultClass, ResilienceError};
pub use metrics::ResilienceMetrics;
pub use policy::ResiliencePolicy;
pub use report::{ErrorReport, Severity, DEFAULT_MESSAGE_KEY};

//! Sentinel request bridge
//!
//! Outbound JSON calls with a hard per-attempt deadline. Retry and circuit
//! breaking are delegated to the [`sentinel_resilience::ResilienceEngine`];
//! the bridge only decides what counts as transient.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sentinel_bridge::{BridgeConfig, RequestBridge, StaticConfigLoader};
//! use sentinel_resilience::ResilienceEngine;
//! use sentinel_trace::TraceRecorder;
//!
//! # async fn run() -> Result<(), sentinel_bridge::BridgeError> {
//! let engine = Arc::new(ResilienceEngine::new(TraceRecorder::default()));
//! let bridge = RequestBridge::new(
//!     engine,
//!     StaticConfigLoader(BridgeConfig::new("http://erp.internal:8080")),
//! );
//!
//! let order = bridge
//!     .request("/v1/orders", "acme", &serde_json::json!({ "sku": "A-1" }))
//!     .await?;
//! println!("{}", order);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod deadline;
pub mod error;

pub use bridge::{RequestBridge, APPARATUS};
pub use config::{
    BridgeConfig, ConfigLoader, EnvConfigLoader, StaticConfigLoader, DEFAULT_TENANT_HEADER,
    DEFAULT_TIMEOUT_MS,
};
pub use deadline::{DeadlineGuard, TimerCounter};
pub use error::{
    BridgeError, INVALID_CONFIG_KEY, INVALID_REQUEST_KEY, MALFORMED_RESPONSE_KEY, REJECTED_KEY,
    TIMEOUT_KEY, UNREACHABLE_KEY,
};

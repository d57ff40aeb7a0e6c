//! Shared building blocks for the Sentinel resilience & observability core.
//!
//! This crate holds the pieces every other Sentinel crate leans on:
//!
//! - [`validation`]: the shape-validation boundary (`Validate` + [`validate`])
//! - [`environment`]: the deployment environment tag carried by reports
//! - [`capability`]: the explicit driver capability model, implemented by
//!   driver crates outside this workspace
//!
//! Nothing here performs I/O.

pub mod capability;
pub mod environment;
pub mod validation;

pub use capability::{Capability, CapabilitySet, Driver, EmbeddingCapability};
pub use environment::Environment;
pub use validation::{validate, FieldViolation, SchemaViolationError, Validate, Violations};

//! Sentinel service
//!
//! Library half of the `sentinel` binary: settings loading, component
//! wiring and the HTTP router, kept here so they can be tested without a
//! running process.

pub mod app;
pub mod settings;

pub use app::{create_router, halt_on_terminal, App, StartupError};
pub use settings::{Settings, SettingsError, TriageSettings};

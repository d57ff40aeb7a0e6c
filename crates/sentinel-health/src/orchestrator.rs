//! Concurrent health orchestration

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use sentinel_core::{validate, Environment, SchemaViolationError};
use sentinel_resilience::{codes, ErrorReport, ResilienceEngine, Severity};
use thiserror::Error;
use tracing::info;

use super::probe::{run_probe, HeartbeatProbe};
use super::record::{HealthReport, HeartbeatRecord};

pub const APPARATUS: &str = "HealthOrchestrator";
/// Message key for a consolidated report that failed validation
pub const INVALID_REPORT_KEY: &str = "health.report.invalid";

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("a probe named '{0}' is already registered")]
    DuplicateProbe(String),

    #[error("probe name must not be empty")]
    UnnamedProbe,

    #[error("health report failed validation: {0}")]
    InvalidReport(#[from] SchemaViolationError),
}

/// Runs every registered probe concurrently and consolidates the results
pub struct HealthOrchestrator {
    engine: Arc<ResilienceEngine>,
    environment: Environment,
    probes: Vec<Arc<dyn HeartbeatProbe>>,
}

impl fmt::Debug for HealthOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthOrchestrator")
            .field("environment", &self.environment)
            .field("probes", &self.probe_names())
            .finish()
    }
}

impl HealthOrchestrator {
    pub fn new(engine: Arc<ResilienceEngine>, environment: Environment) -> Self {
        Self {
            engine,
            environment,
            probes: Vec::new(),
        }
    }

    /// Add a probe; names are unique per orchestrator
    pub fn register(&mut self, probe: Arc<dyn HeartbeatProbe>) -> Result<(), HealthError> {
        let name = probe.name();
        if name.trim().is_empty() {
            return Err(HealthError::UnnamedProbe);
        }
        if self.probes.iter().any(|p| p.name() == name) {
            return Err(HealthError::DuplicateProbe(name.to_string()));
        }
        self.probes.push(probe);
        Ok(())
    }

    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Probe everything in parallel and consolidate into one report
    ///
    /// Every probe is awaited; one failing probe never cancels the others.
    /// The report is validated before it is returned.
    pub async fn generate_global_health_report(&self) -> Result<HealthReport, HealthError> {
        self.engine
            .recorder()
            .trace_execution(
                APPARATUS,
                "generate_global_health_report",
                || async {
                    let records =
                        join_all(self.probes.iter().map(|probe| run_probe(probe.as_ref(), &self.engine)))
                            .await;
                    self.consolidate(records)
                },
                None,
            )
            .await
    }

    /// Build and validate the report for `records`
    ///
    /// A report that fails validation is reported at HIGH and surfaced
    /// without retry. Records from [`run_probe`] always pass; hand-built
    /// records are not trusted.
    pub fn consolidate(&self, records: Vec<HeartbeatRecord>) -> Result<HealthReport, HealthError> {
        let report = HealthReport::consolidate(records, self.environment);

        match validate(report, "HealthReport") {
            Ok(report) => {
                info!(
                    report_id = %report.report_id,
                    status = report.status.as_str(),
                    components = report.components.len(),
                    "Health report generated"
                );
                Ok(report)
            }
            Err(violation) => {
                self.engine.report(
                    ErrorReport::new(
                        codes::INVALID_HEALTH_REPORT,
                        Severity::High,
                        APPARATUS,
                        "generate_global_health_report",
                        violation.to_string(),
                    )
                    .with_message_key(INVALID_REPORT_KEY)
                    .with_context_value("paths", violation.paths()),
                );
                Err(HealthError::InvalidReport(violation))
            }
        }
    }
}

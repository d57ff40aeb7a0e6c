//! Service wiring: startup, shared state and the HTTP router

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use sentinel_bridge::{EnvConfigLoader, RequestBridge, StaticConfigLoader};
use sentinel_core::Environment;
use sentinel_health::{HealthOrchestrator, HealthReport};
use sentinel_resilience::{
    codes, ErrorReport, ReportOutcome, ResilienceEngine, ResilienceMetrics, Severity,
};
use sentinel_trace::TraceRecorder;
use sentinel_triage::{analyze_text_urgency, UrgencyReport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::settings::Settings;

const APPARATUS: &str = "SentinelService";

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("startup halted by a terminal report: {0}")]
    Halted(String),

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Everything the service and the one-shot commands share
pub struct App {
    pub engine: Arc<ResilienceEngine>,
    pub orchestrator: HealthOrchestrator,
    pub bridge: RequestBridge,
    pub registry: Registry,
    pub keywords: Vec<String>,
    pub environment: Environment,
}

impl App {
    /// Wire every component from `settings`
    ///
    /// A probe that cannot be built or registered is reported as a CRITICAL
    /// unrecoverable configuration fault and halts startup.
    pub fn bootstrap(settings: Settings, recorder: TraceRecorder) -> Result<Self, StartupError> {
        let registry = Registry::new();
        let metrics = ResilienceMetrics::new(&registry)?;
        let engine = Arc::new(
            ResilienceEngine::new(recorder)
                .with_policy(settings.resilience.clone())
                .with_metrics(metrics),
        );

        let mut orchestrator = HealthOrchestrator::new(engine.clone(), settings.environment);
        for target in &settings.probes {
            let registered = target
                .build()
                .map_err(|e| e.to_string())
                .and_then(|probe| orchestrator.register(probe).map_err(|e| e.to_string()));
            if let Err(message) = registered {
                let report = ErrorReport::new(
                    codes::INVALID_CONFIGURATION,
                    Severity::Critical,
                    APPARATUS,
                    "bootstrap",
                    format!("probe '{}': {}", target.name(), message),
                )
                .with_message_key("sentinel.startup.probe_invalid")
                .unrecoverable();
                halt_on_terminal(engine.report(report), &message)?;
            }
        }

        let bridge = match settings.bridge.clone() {
            Some(config) => RequestBridge::new(engine.clone(), StaticConfigLoader(config)),
            None => RequestBridge::new(engine.clone(), EnvConfigLoader),
        };

        Ok(Self {
            engine,
            orchestrator,
            bridge,
            registry,
            keywords: settings.triage.keywords,
            environment: settings.environment,
        })
    }

    /// Report a configuration fault found before [`App::bootstrap`] could run
    pub fn report_startup_fault(recorder: TraceRecorder, message: &str) -> ReportOutcome {
        ResilienceEngine::new(recorder).report(
            ErrorReport::new(
                codes::INVALID_CONFIGURATION,
                Severity::Critical,
                APPARATUS,
                "load_settings",
                message,
            )
            .with_message_key("sentinel.startup.settings_invalid")
            .unrecoverable(),
        )
    }
}

/// Turn a terminal report outcome into a startup error
pub fn halt_on_terminal(outcome: ReportOutcome, message: &str) -> Result<(), StartupError> {
    if outcome.is_terminal() {
        Err(StartupError::Halted(message.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    pub content: String,
    /// Overrides the configured keyword set
    pub keywords: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

pub fn create_router(app: Arc<App>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/v1/triage", post(triage))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Fresh report on every call: 200 unless a component is UNREACHABLE
async fn health(
    State(app): State<Arc<App>>,
) -> Result<(StatusCode, Json<HealthReport>), (StatusCode, Json<ApiError>)> {
    match app.orchestrator.generate_global_health_report().await {
        Ok(report) => {
            let status = StatusCode::from_u16(report.http_status_code())
                .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
            Ok((status, Json(report)))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new("InvalidHealthReport", e.to_string())),
        )),
    }
}

async fn metrics(State(app): State<Arc<App>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&app.registry.gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain".to_string())],
            e.to_string().into_bytes(),
        ),
    }
}

async fn triage(
    State(app): State<Arc<App>>,
    Json(request): Json<TriageRequest>,
) -> Result<Json<UrgencyReport>, (StatusCode, Json<ApiError>)> {
    let keywords = request.keywords.as_deref().unwrap_or(&app.keywords);
    analyze_text_urgency(&request.content, keywords)
        .map(Json)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::new("InvalidInput", e.to_string()))))
}

//! Outbound request bridge

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use sentinel_core::validate;
use sentinel_resilience::{
    codes, Classify, ErrorReport, ResilienceEngine, ResiliencePolicy, Severity,
};
use sentinel_trace::Metadata;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::config::{BridgeConfig, ConfigLoader, EnvConfigLoader};
use super::deadline::{DeadlineGuard, TimerCounter};
use super::error::BridgeError;

pub const APPARATUS: &str = "RequestBridge";

const MAX_ERROR_BODY_CHARS: usize = 512;

/// One resolved call, shared by every attempt
struct Call<'a> {
    endpoint: &'a str,
    url: String,
    method: &'a Method,
    tenant_header: &'a str,
    tenant: HeaderValue,
    payload: &'a Value,
    timeout: Duration,
}

/// Timeout-bounded JSON calls against the configured base URL
///
/// Every call is traced, and each endpoint gets its own circuit in the
/// engine. Attempts are cut off by a [`DeadlineGuard`].
pub struct RequestBridge {
    engine: Arc<ResilienceEngine>,
    loader: Arc<dyn ConfigLoader>,
    config: OnceCell<BridgeConfig>,
    client: reqwest::Client,
    timers: TimerCounter,
    policy: Option<ResiliencePolicy>,
}

impl fmt::Debug for RequestBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBridge")
            .field("config", &self.config.get())
            .field("pending_timers", &self.timers.armed())
            .finish()
    }
}

impl RequestBridge {
    /// Bridge whose configuration comes from `loader` on first use
    pub fn new(engine: Arc<ResilienceEngine>, loader: impl ConfigLoader + 'static) -> Self {
        Self {
            engine,
            loader: Arc::new(loader),
            config: OnceCell::new(),
            client: reqwest::Client::new(),
            timers: TimerCounter::new(),
            policy: None,
        }
    }

    /// Bridge configured from `SENTINEL_BRIDGE_*`
    pub fn from_env(engine: Arc<ResilienceEngine>) -> Self {
        Self::new(engine, EnvConfigLoader)
    }

    /// Retry policy for bridge calls instead of the engine default
    pub fn with_policy(mut self, policy: ResiliencePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Timers armed right now; zero whenever no attempt is in flight
    pub fn pending_timers(&self) -> usize {
        self.timers.armed()
    }

    /// Load and validate the configuration once
    ///
    /// A failed load is not cached, the next call tries again.
    pub async fn config(&self) -> Result<&BridgeConfig, BridgeError> {
        self.config
            .get_or_try_init(|| async {
                let config = validate(self.loader.load()?, "BridgeConfig")?;
                info!(
                    base_url = %config.base_url,
                    timeout_ms = config.timeout_ms,
                    tenant_header = %config.tenant_header,
                    "Bridge configuration loaded"
                );
                Ok::<_, BridgeError>(config)
            })
            .await
    }

    /// POST `payload` to `endpoint` on behalf of `tenant_id`
    pub async fn request(
        &self,
        endpoint: &str,
        tenant_id: &str,
        payload: &Value,
    ) -> Result<Value, BridgeError> {
        self.request_with_method(endpoint, tenant_id, payload, Method::POST)
            .await
    }

    /// Send `payload` with `method`; GET and HEAD carry no body
    ///
    /// Returns the decoded JSON response, or `Value::Null` for an empty body.
    pub async fn request_with_method(
        &self,
        endpoint: &str,
        tenant_id: &str,
        payload: &Value,
        method: Method,
    ) -> Result<Value, BridgeError> {
        let mut metadata = Metadata::new();
        metadata.insert("tenant_id".into(), tenant_id.into());
        metadata.insert("method".into(), method.as_str().into());

        self.engine
            .recorder()
            .trace_execution(
                APPARATUS,
                endpoint,
                || self.dispatch(endpoint, tenant_id, payload, &method),
                Some(metadata),
            )
            .await
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        tenant_id: &str,
        payload: &Value,
        method: &Method,
    ) -> Result<Value, BridgeError> {
        let config = match self.config().await {
            Ok(config) => config,
            Err(e) => {
                self.report_rejection("configure", &e);
                return Err(e);
            }
        };

        let tenant = match check_request(endpoint, tenant_id) {
            Ok(tenant) => tenant,
            Err(e) => {
                self.report_rejection("request", &e);
                return Err(e);
            }
        };

        let call = Call {
            endpoint,
            url: config.url_for(endpoint),
            method,
            tenant_header: &config.tenant_header,
            tenant,
            payload,
            timeout: config.timeout(),
        };

        self.engine
            .execute_with_resilience(|| self.attempt(&call), APPARATUS, endpoint, self.policy.as_ref())
            .await
            .map_err(BridgeError::from)
    }

    async fn attempt(&self, call: &Call<'_>) -> Result<Value, BridgeError> {
        let guard = DeadlineGuard::arm(call.timeout, &self.timers);

        let mut request = self
            .client
            .request(call.method.clone(), &call.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(call.tenant_header, call.tenant.clone());
        if *call.method != Method::GET && *call.method != Method::HEAD {
            request = request.json(call.payload);
        }

        let outcome = guard.run(exchange(request, call.endpoint)).await;
        drop(guard);

        outcome.unwrap_or_else(|| {
            Err(BridgeError::Timeout {
                endpoint: call.endpoint.to_string(),
                timeout_ms: call.timeout.as_millis() as u64,
            })
        })
    }

    /// Report a call refused before any attempt was made
    ///
    /// Configuration faults are CRITICAL and unrecoverable; malformed
    /// requests are HIGH. Neither counts against a circuit.
    fn report_rejection(&self, operation: &str, err: &BridgeError) {
        error!(operation, error = %err, "Bridge call rejected");
        let severity = err.severity().unwrap_or(Severity::High);
        let mut report = ErrorReport::new(
            err.error_code().unwrap_or(codes::FATAL_FAULT),
            severity,
            APPARATUS,
            operation,
            err.to_string(),
        )
        .with_message_key(err.message_key().unwrap_or(sentinel_resilience::FATAL_FAULT_KEY));
        if matches!(err, BridgeError::Configuration(_)) {
            report = report.unrecoverable();
        }
        self.engine.report(report);
    }
}

fn check_request(endpoint: &str, tenant_id: &str) -> Result<HeaderValue, BridgeError> {
    if endpoint.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("endpoint must not be empty".into()));
    }
    if tenant_id.trim().is_empty() {
        return Err(BridgeError::InvalidRequest("tenant id must not be empty".into()));
    }
    HeaderValue::from_str(tenant_id)
        .map_err(|e| BridgeError::InvalidRequest(format!("tenant id: {}", e)))
}

async fn exchange(request: RequestBuilder, endpoint: &str) -> Result<Value, BridgeError> {
    let connectivity = |e: reqwest::Error| BridgeError::Connectivity {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    };

    let response = request.send().await.map_err(connectivity)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BridgeError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    let bytes = response.bytes().await.map_err(connectivity)?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| BridgeError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

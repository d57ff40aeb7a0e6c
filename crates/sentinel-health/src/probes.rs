//! Built-in probe kinds

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::probe::{HeartbeatProbe, ProbeError, ProbeOutcome, DEFAULT_PROBE_TIMEOUT};

/// HTTP GET against a health path: 2xx alive, 5xx unreachable, anything else impaired
pub struct HttpProbe {
    name: String,
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    latency_budget: Option<Duration>,
}

impl fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProbe")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, ProbeError> {
        let url = url.into();
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("https://{}", url)
        };
        reqwest::Url::parse(&url).map_err(|e| ProbeError::InvalidTarget(format!("{}: {}", url, e)))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProbeError::InvalidTarget(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            url,
            client,
            timeout: DEFAULT_PROBE_TIMEOUT,
            latency_budget: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = Some(budget);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HeartbeatProbe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn latency_budget(&self) -> Option<Duration> {
        self.latency_budget
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(ProbeOutcome::Alive)
        } else if status.is_server_error() {
            Err(ProbeError::Status(status.as_u16()))
        } else {
            Ok(ProbeOutcome::Impaired(format!("non-success status: {}", status)))
        }
    }
}

/// TCP connect to `host:port`
#[derive(Debug, Clone)]
pub struct TcpProbe {
    name: String,
    address: String,
    timeout: Duration,
    latency_budget: Option<Duration>,
}

impl TcpProbe {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Result<Self, ProbeError> {
        let address = address.into();
        let valid = address
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            return Err(ProbeError::InvalidTarget(format!(
                "'{}' is not host:port",
                address
            )));
        }

        Ok(Self {
            name: name.into(),
            address,
            timeout: DEFAULT_PROBE_TIMEOUT,
            latency_budget: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = Some(budget);
        self
    }
}

#[async_trait]
impl HeartbeatProbe for TcpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn latency_budget(&self) -> Option<Duration> {
        self.latency_budget
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        tokio::net::TcpStream::connect(&self.address)
            .await
            .map(|_| ProbeOutcome::Alive)
            .map_err(|e| ProbeError::Connect(format!("{}: {}", self.address, e)))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LivenessError(pub String);

/// Persistence boundary: answers whether the store is reachable
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    async fn ping(&self) -> Result<(), LivenessError>;
}

/// Database liveness through a [`LivenessCheck`]
pub struct DatabaseProbe {
    name: String,
    store: Arc<dyn LivenessCheck>,
    timeout: Duration,
    latency_budget: Option<Duration>,
}

impl DatabaseProbe {
    pub fn new(name: impl Into<String>, store: Arc<dyn LivenessCheck>) -> Self {
        Self {
            name: name.into(),
            store,
            timeout: DEFAULT_PROBE_TIMEOUT,
            latency_budget: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = Some(budget);
        self
    }
}

#[async_trait]
impl HeartbeatProbe for DatabaseProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn latency_budget(&self) -> Option<Duration> {
        self.latency_budget
    }

    async fn check(&self) -> Result<ProbeOutcome, ProbeError> {
        self.store
            .ping()
            .await
            .map(|()| ProbeOutcome::Alive)
            .map_err(|e| ProbeError::Liveness(e.0))
    }
}

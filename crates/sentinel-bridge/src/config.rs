//! Bridge configuration and its loader

use std::time::Duration;

use reqwest::header::HeaderName;
use sentinel_core::validation::{Validate, Violations};
use serde::{Deserialize, Serialize};

use super::error::BridgeError;

pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-Id";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Where outbound calls go and how long they may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub tenant_header: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_tenant_header(mut self, header: impl Into<String>) -> Self {
        self.tenant_header = header.into();
        self
    }

    /// Read `SENTINEL_BRIDGE_BASE_URL`, `SENTINEL_BRIDGE_TIMEOUT_MS` and
    /// `SENTINEL_BRIDGE_TENANT_HEADER`, then validate
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`BridgeConfig::from_env`] over any variable source
    ///
    /// An unset variable keeps its default; a set but unparsable one is a
    /// violation of the matching field.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut v = Violations::new();
        let config = Self {
            base_url: lookup("SENTINEL_BRIDGE_BASE_URL").unwrap_or_default(),
            timeout_ms: v.parse_or(
                "timeout_ms",
                lookup("SENTINEL_BRIDGE_TIMEOUT_MS"),
                defaults.timeout_ms,
            ),
            tenant_header: lookup("SENTINEL_BRIDGE_TENANT_HEADER").unwrap_or(defaults.tenant_header),
        };
        Ok(v.finish(config, "BridgeConfig")?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `base_url` joined with `endpoint` by exactly one slash
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

impl Validate for BridgeConfig {
    fn check(&self, v: &mut Violations) {
        v.require(
            "base_url",
            reqwest::Url::parse(&self.base_url)
                .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
                .unwrap_or(false),
            format!("'{}' is not an absolute http(s) URL", self.base_url),
        );
        v.in_range("timeout_ms", self.timeout_ms, 1, 120_000);
        v.require(
            "tenant_header",
            HeaderName::from_bytes(self.tenant_header.as_bytes()).is_ok(),
            format!("'{}' is not a valid header name", self.tenant_header),
        );
    }
}

/// Produces the bridge configuration on first use
pub trait ConfigLoader: Send + Sync {
    fn load(&self) -> Result<BridgeConfig, BridgeError>;
}

impl<F> ConfigLoader for F
where
    F: Fn() -> Result<BridgeConfig, BridgeError> + Send + Sync,
{
    fn load(&self) -> Result<BridgeConfig, BridgeError> {
        self()
    }
}

/// Loads from `SENTINEL_BRIDGE_*`
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvConfigLoader;

impl ConfigLoader for EnvConfigLoader {
    fn load(&self) -> Result<BridgeConfig, BridgeError> {
        BridgeConfig::from_env()
    }
}

/// Hands out a fixed configuration
#[derive(Debug, Clone)]
pub struct StaticConfigLoader(pub BridgeConfig);

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<BridgeConfig, BridgeError> {
        Ok(self.0.clone())
    }
}

//! Service settings file
//!
//! YAML (`.yaml`/`.yml`), TOML (`.toml`) or JSON (`.json`), chosen by
//! extension. Every section is optional:
//!
//! ```yaml
//! environment: production
//! bridge:
//!   base_url: http://erp.internal:8080
//!   timeout_ms: 3000
//! resilience:
//!   max_attempts: 4
//!   failure_threshold: 10
//! probes:
//!   - kind: tcp
//!     name: redis
//!     address: redis:6379
//! triage:
//!   keywords: [emergency, outage]
//! ```
//!
//! `SENTINEL_ENV` overrides `environment` when set; an unknown name is an
//! error rather than a silent fallback.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sentinel_bridge::BridgeConfig;
use sentinel_core::validation::{SchemaViolationError, Validate, Violations};
use sentinel_core::Environment;
use sentinel_health::ProbeTarget;
use sentinel_resilience::ResiliencePolicy;
use sentinel_triage::DEFAULT_KEYWORDS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported settings format '{0}', expected yaml, yml, toml or json")]
    UnsupportedFormat(String),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] SchemaViolationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageSettings {
    pub keywords: Vec<String>,
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,
    /// Absent: the bridge reads `SENTINEL_BRIDGE_*` on first use
    pub bridge: Option<BridgeConfig>,
    pub resilience: ResiliencePolicy,
    pub probes: Vec<ProbeTarget>,
    pub triage: TriageSettings,
}

impl Settings {
    /// Parse and validate a settings file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let settings: Settings = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(SettingsError::UnsupportedFormat(other.to_string())),
        };

        settings.resolve(env_var)
    }

    /// Settings file when given, otherwise defaults; validated either way
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::from_lookup(env_var),
        }
    }

    /// Defaults plus `SENTINEL_RETRY_*`, `SENTINEL_CIRCUIT_*` and `SENTINEL_ENV`
    fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings {
            resilience: ResiliencePolicy::from_lookup(&lookup)?,
            ..Settings::default()
        };
        settings.resolve(lookup)
    }

    /// Apply `SENTINEL_ENV` and validate; an unknown environment name is rejected
    fn resolve<F>(self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut v = Violations::new();
        let environment = v.parse_or("environment", lookup("SENTINEL_ENV"), self.environment);
        Ok(v.finish(Self { environment, ..self }, "Settings")?)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Validate for Settings {
    fn check(&self, v: &mut Violations) {
        if let Some(bridge) = &self.bridge {
            v.nested("bridge", bridge);
        }
        v.nested("resilience", &self.resilience);

        let mut names = HashSet::new();
        for (i, probe) in self.probes.iter().enumerate() {
            v.nested(&format!("probes.{}", i), probe);
            v.require(
                &format!("probes.{}.name", i),
                names.insert(probe.name()),
                format!("duplicate probe name '{}'", probe.name()),
            );
        }

        for (i, keyword) in self.triage.keywords.iter().enumerate() {
            v.non_empty(&format!("triage.keywords.{}", i), keyword);
        }
    }
}

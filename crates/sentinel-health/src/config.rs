//! Probe targets as read from the settings file
//!
//! ```yaml
//! probes:
//!   - kind: http
//!     name: billing-api
//!     url: http://billing:8080/health
//!     latency_budget_ms: 250
//!   - kind: tcp
//!     name: redis
//!     address: redis:6379
//!     timeout_ms: 500
//! ```

use std::sync::Arc;
use std::time::Duration;

use sentinel_core::validation::{Validate, Violations};
use serde::{Deserialize, Serialize};

use super::probe::{HeartbeatProbe, ProbeError};
use super::probes::{HttpProbe, TcpProbe};

fn default_timeout_ms() -> u64 {
    2_000
}

/// One configured probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeTarget {
    Http {
        name: String,
        url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        latency_budget_ms: Option<u64>,
    },
    Tcp {
        name: String,
        address: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default)]
        latency_budget_ms: Option<u64>,
    },
}

impl ProbeTarget {
    pub fn name(&self) -> &str {
        match self {
            ProbeTarget::Http { name, .. } | ProbeTarget::Tcp { name, .. } => name,
        }
    }

    /// Build the probe this target describes
    pub fn build(&self) -> Result<Arc<dyn HeartbeatProbe>, ProbeError> {
        match self {
            ProbeTarget::Http {
                name,
                url,
                timeout_ms,
                latency_budget_ms,
            } => {
                let mut probe =
                    HttpProbe::new(name.clone(), url.clone())?.with_timeout(Duration::from_millis(*timeout_ms));
                if let Some(budget) = latency_budget_ms {
                    probe = probe.with_latency_budget(Duration::from_millis(*budget));
                }
                Ok(Arc::new(probe))
            }
            ProbeTarget::Tcp {
                name,
                address,
                timeout_ms,
                latency_budget_ms,
            } => {
                let mut probe =
                    TcpProbe::new(name.clone(), address.clone())?.with_timeout(Duration::from_millis(*timeout_ms));
                if let Some(budget) = latency_budget_ms {
                    probe = probe.with_latency_budget(Duration::from_millis(*budget));
                }
                Ok(Arc::new(probe))
            }
        }
    }
}

impl Validate for ProbeTarget {
    fn check(&self, v: &mut Violations) {
        let (timeout_ms, budget) = match self {
            ProbeTarget::Http {
                url,
                timeout_ms,
                latency_budget_ms,
                ..
            } => {
                v.non_empty("url", url);
                (*timeout_ms, *latency_budget_ms)
            }
            ProbeTarget::Tcp {
                address,
                timeout_ms,
                latency_budget_ms,
                ..
            } => {
                v.non_empty("address", address);
                (*timeout_ms, *latency_budget_ms)
            }
        };
        v.non_empty("name", self.name());
        v.in_range("timeout_ms", timeout_ms, 1, 60_000);
        if let Some(budget) = budget {
            v.require(
                "latency_budget_ms",
                budget <= timeout_ms,
                "must not exceed timeout_ms",
            );
        }
    }
}

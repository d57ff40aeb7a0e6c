//! Heartbeat records and consolidated health reports

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sentinel_core::validation::{Validate, Violations};
use sentinel_core::Environment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reachability of one component, ordered by precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeartbeatStatus {
    Healthy,
    Degraded,
    Unreachable,
}

impl HeartbeatStatus {
    /// Worst status wins: UNREACHABLE > DEGRADED > HEALTHY. Empty input is HEALTHY.
    pub fn consolidate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HeartbeatStatus>,
    {
        statuses
            .into_iter()
            .max()
            .unwrap_or(HeartbeatStatus::Healthy)
    }

    /// HTTP status for a health endpoint serving this status
    pub fn http_status_code(&self) -> u16 {
        match self {
            HeartbeatStatus::Healthy | HeartbeatStatus::Degraded => 200,
            HeartbeatStatus::Unreachable => 503,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeartbeatStatus::Healthy => "HEALTHY",
            HeartbeatStatus::Degraded => "DEGRADED",
            HeartbeatStatus::Unreachable => "UNREACHABLE",
        }
    }
}

/// Result of one probe run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub node: String,
    pub status: HeartbeatStatus,
    pub latency_ms: f64,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HeartbeatRecord {
    pub fn healthy(node: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            node: node.into(),
            status: HeartbeatStatus::Healthy,
            latency_ms,
            last_check: Utc::now(),
            error: None,
        }
    }

    pub fn degraded(node: impl Into<String>, latency_ms: f64, reason: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            status: HeartbeatStatus::Degraded,
            latency_ms,
            last_check: Utc::now(),
            error: Some(reason.into()),
        }
    }

    /// Failed or timed out; latency is reported as 0
    pub fn unreachable(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            status: HeartbeatStatus::Unreachable,
            latency_ms: 0.0,
            last_check: Utc::now(),
            error: Some(error.into()),
        }
    }
}

impl Validate for HeartbeatRecord {
    fn check(&self, v: &mut Violations) {
        v.non_empty("node", &self.node);
        v.non_negative("latency_ms", self.latency_ms);
        if self.status == HeartbeatStatus::Unreachable {
            v.require(
                "error",
                self.error.as_deref().is_some_and(|e| !e.trim().is_empty()),
                "UNREACHABLE records must carry the error",
            );
            v.require("latency_ms", self.latency_ms == 0.0, "UNREACHABLE records report 0 latency");
        }
    }
}

/// System-wide health, built fresh on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub report_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: HeartbeatStatus,
    pub components: BTreeMap<String, HeartbeatRecord>,
    pub environment: Environment,
}

impl HealthReport {
    /// Consolidate `records` into a report
    pub fn consolidate(records: Vec<HeartbeatRecord>, environment: Environment) -> Self {
        let status = HeartbeatStatus::consolidate(records.iter().map(|r| r.status));
        let components = records
            .into_iter()
            .map(|record| (record.node.clone(), record))
            .collect();
        Self {
            report_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status,
            components,
            environment,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        self.status.http_status_code()
    }

    /// Components currently at `status`
    pub fn components_at(&self, status: HeartbeatStatus) -> Vec<&str> {
        self.components
            .values()
            .filter(|r| r.status == status)
            .map(|r| r.node.as_str())
            .collect()
    }
}

impl Validate for HealthReport {
    fn check(&self, v: &mut Violations) {
        for (name, record) in &self.components {
            v.nested(&format!("components.{}", name), record);
            v.require(
                &format!("components.{}.node", name),
                record.node == *name,
                format!("keyed as '{}' but names '{}'", name, record.node),
            );
        }
        let expected = HeartbeatStatus::consolidate(self.components.values().map(|r| r.status));
        v.require(
            "status",
            self.status == expected,
            format!("{} does not match consolidated {}", self.status.as_str(), expected.as_str()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::validate;

    #[test]
    fn test_precedence() {
        use HeartbeatStatus::*;
        assert_eq!(HeartbeatStatus::consolidate([Healthy, Degraded, Healthy]), Degraded);
        assert_eq!(HeartbeatStatus::consolidate([Degraded, Unreachable, Healthy]), Unreachable);
        assert_eq!(HeartbeatStatus::consolidate(Vec::new()), Healthy);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(HeartbeatStatus::Healthy.http_status_code(), 200);
        assert_eq!(HeartbeatStatus::Degraded.http_status_code(), 200);
        assert_eq!(HeartbeatStatus::Unreachable.http_status_code(), 503);
    }

    #[test]
    fn test_unreachable_has_zero_latency_and_error() {
        let record = HeartbeatRecord::unreachable("redis", "connection refused");
        assert_eq!(record.latency_ms, 0.0);
        assert!(validate(record, "record").is_ok());
    }

    #[test]
    fn test_report_consolidates_and_validates() {
        let report = HealthReport::consolidate(
            vec![
                HeartbeatRecord::healthy("db", 3.2),
                HeartbeatRecord::degraded("cache", 250.0, "slow"),
            ],
            Environment::Staging,
        );
        assert_eq!(report.status, HeartbeatStatus::Degraded);
        assert_eq!(report.components.len(), 2);
        assert_eq!(report.components_at(HeartbeatStatus::Degraded), vec!["cache"]);
        assert!(validate(report, "report").is_ok());
    }

    #[test]
    fn test_tampered_report_fails_validation() {
        let mut report =
            HealthReport::consolidate(vec![HeartbeatRecord::healthy("db", 1.0)], Environment::Production);
        report.status = HeartbeatStatus::Unreachable;
        report
            .components
            .insert("queue".into(), HeartbeatRecord::healthy("", -1.0));

        let err = validate(report, "report").unwrap_err();
        assert_eq!(
            err.paths(),
            vec![
                "components.queue.node",
                "components.queue.latency_ms",
                "components.queue.node",
                "status"
            ]
        );
    }

    #[test]
    fn test_report_serializes_status_names() {
        let report =
            HealthReport::consolidate(vec![HeartbeatRecord::unreachable("db", "down")], Environment::Development);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "UNREACHABLE");
        assert_eq!(json["environment"], "development");
        assert_eq!(json["components"]["db"]["error"], "down");
    }
}

//! Integration tests for ResilienceEngine

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentinel_resilience::{
    codes, CircuitPhase, Classify, ErrorCode, ErrorReport, Fault, FaultClass, ReportOutcome,
    ResilienceEngine, ResilienceError, ResilienceMetrics, ResiliencePolicy, Severity,
    CIRCUIT_OPEN_KEY, FATAL_FAULT_KEY, RETRIES_EXHAUSTED_KEY,
};
use sentinel_trace::{MemoryDiagnostics, MemorySink, TelemetryLevel, TraceRecorder};

struct Harness {
    engine: ResilienceEngine,
    sink: MemorySink,
    diagnostics: MemoryDiagnostics,
}

fn harness(policy: ResiliencePolicy) -> Harness {
    let sink = MemorySink::new();
    let diagnostics = MemoryDiagnostics::new();
    let recorder =
        TraceRecorder::new(Arc::new(sink.clone())).with_diagnostics(Arc::new(diagnostics.clone()));
    Harness {
        engine: ResilienceEngine::new(recorder).with_policy(policy),
        sink,
        diagnostics,
    }
}

#[tokio::test(start_paused = true)]
async fn test_fails_twice_then_succeeds_within_ceiling() {
    let h = harness(ResiliencePolicy::default());
    let calls = AtomicU32::new(0);

    let result = h
        .engine
        .execute_with_resilience(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(Fault::transient(format!("attempt {} refused", n)))
                    } else {
                        Ok(n)
                    }
                }
            },
            "ErpMock",
            "sync",
            None,
        )
        .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let state = h.engine.circuit_state("ErpMock", "sync");
    assert_eq!(state.phase, CircuitPhase::Closed);
    assert_eq!(state.consecutive_failures, 0);
    assert!(h.sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sixth_call_is_rejected_without_invoking_operation() {
    let h = harness(ResiliencePolicy::default());
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..5 {
        let calls = calls.clone();
        let result: Result<(), _> = h
            .engine
            .execute_with_resilience(
                move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Fault::transient("connection reset")) }
                },
                "MetaMessaging",
                "send",
                None,
            )
            .await;
        assert!(matches!(result, Err(ResilienceError::Operation(_))));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 15);
    assert_eq!(
        h.engine.circuit_state("MetaMessaging", "send").phase,
        CircuitPhase::Open
    );

    let invoked = calls.clone();
    let sixth: Result<(), _> = h
        .engine
        .execute_with_resilience(
            move || {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Err(Fault::transient("connection reset")) }
            },
            "MetaMessaging",
            "send",
            None,
        )
        .await;

    assert!(sixth.unwrap_err().is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 15);

    let warnings = h.sink.entries_at(TelemetryLevel::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message_key, CIRCUIT_OPEN_KEY);

    let errors = h.sink.entries_at(TelemetryLevel::Error);
    assert_eq!(errors.len(), 5);
    assert!(errors.iter().all(|e| e.message_key == RETRIES_EXHAUSTED_KEY));
}

#[tokio::test(start_paused = true)]
async fn test_other_keys_are_unaffected_by_open_circuit() {
    let h = harness(ResiliencePolicy::default().with_failure_threshold(1).with_max_attempts(1));

    let _: Result<(), _> = h
        .engine
        .execute_with_resilience(|| async { Err(Fault::transient("down")) }, "Erp", "a", None)
        .await;
    let other = h
        .engine
        .execute_with_resilience(|| async { Ok::<_, Fault>(1) }, "Erp", "b", None)
        .await;

    assert_eq!(other.unwrap(), 1);
    assert_eq!(h.engine.circuit_state("Erp", "a").phase, CircuitPhase::Open);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_is_not_retried() {
    let h = harness(ResiliencePolicy::default());
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = h
        .engine
        .execute_with_resilience(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Fault::fatal("payload rejected")) }
            },
            "Bridge",
            "/v1/send",
            None,
        )
        .await;

    assert_eq!(
        result.unwrap_err().into_operation(),
        Some(Fault::Fatal("payload rejected".into()))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let state = h.engine.circuit_state("Bridge", "/v1/send");
    assert_eq!(state.consecutive_failures, 1);

    let entry = &h.sink.entries_at(TelemetryLevel::Error)[0];
    assert_eq!(entry.message_key, FATAL_FAULT_KEY);
    let metadata = entry.metadata.as_ref().unwrap();
    assert_eq!(metadata["code"], codes::FATAL_FAULT.as_str());
    assert_eq!(metadata["context"]["attempts"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_closes_on_success() {
    let policy = ResiliencePolicy::default()
        .with_failure_threshold(1)
        .with_max_attempts(1)
        .with_cool_down(Duration::from_secs(2));
    let h = harness(policy);

    let _: Result<(), _> = h
        .engine
        .execute_with_resilience(|| async { Err(Fault::transient("down")) }, "Health", "db", None)
        .await;
    assert_eq!(h.engine.circuit_state("Health", "db").phase, CircuitPhase::Open);

    tokio::time::advance(Duration::from_secs(2)).await;

    let probe = h
        .engine
        .execute_with_resilience(|| async { Ok::<_, Fault>("up") }, "Health", "db", None)
        .await;
    assert_eq!(probe.unwrap(), "up");

    let state = h.engine.circuit_state("Health", "db");
    assert_eq!(state.phase, CircuitPhase::Closed);
    assert_eq!(state.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_gets_one_attempt_and_reopens() {
    let policy = ResiliencePolicy::default()
        .with_failure_threshold(1)
        .with_cool_down(Duration::from_secs(2));
    let h = harness(policy);
    let calls = AtomicU32::new(0);

    let fail = || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(Fault::transient("down")) }
    };

    let _ = h.engine.execute_with_resilience(fail, "Health", "db", None).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(2)).await;
    let _ = h.engine.execute_with_resilience(fail, "Health", "db", None).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let state = h.engine.circuit_state("Health", "db");
    assert_eq!(state.phase, CircuitPhase::Open);
    assert_eq!(state.consecutive_failures, 2);
}

#[derive(Debug, thiserror::Error)]
#[error("gateway said no")]
struct GatewayRefused;

impl Classify for GatewayRefused {
    fn fault_class(&self) -> FaultClass {
        FaultClass::Fatal
    }

    fn error_code(&self) -> Option<ErrorCode> {
        Some(ErrorCode::from_static("OS-GW-7"))
    }

    fn message_key(&self) -> Option<&'static str> {
        Some("gateway.refused")
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Medium)
    }
}

#[tokio::test(start_paused = true)]
async fn test_error_supplies_its_own_report_fields() {
    let h = harness(ResiliencePolicy::default());

    let _: Result<(), _> = h
        .engine
        .execute_with_resilience(|| async { Err(GatewayRefused) }, "Gateway", "charge", None)
        .await;

    let entries = h.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, TelemetryLevel::Warning);
    assert_eq!(entries[0].message_key, "gateway.refused");
    assert_eq!(entries[0].metadata.as_ref().unwrap()["code"], "OS-GW-7");
}

#[tokio::test(start_paused = true)]
async fn test_per_call_policy_overrides_engine_policy() {
    let h = harness(ResiliencePolicy::default());
    let calls = AtomicU32::new(0);
    let single = ResiliencePolicy::default().with_max_attempts(1);

    let _: Result<(), _> = h
        .engine
        .execute_with_resilience(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Fault::transient("x")) }
            },
            "Erp",
            "sync",
            Some(&single),
        )
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_critical_unrecoverable_report_is_terminal() {
    let h = harness(ResiliencePolicy::default());
    let report = ErrorReport::new(
        codes::INVALID_CONFIGURATION,
        Severity::Critical,
        "Boot",
        "load_settings",
        "bridge base url missing",
    )
    .unrecoverable();

    let outcome = h.engine.report(report);
    assert_eq!(outcome, ReportOutcome::Terminal);
    assert!(outcome.is_terminal());
    assert_eq!(h.sink.entries_at(TelemetryLevel::Error).len(), 1);
}

#[test]
fn test_invalid_report_goes_to_diagnostics() {
    let h = harness(ResiliencePolicy::default());
    let report = ErrorReport::new(
        ErrorCode::from_static("NET-1"),
        Severity::High,
        "Bridge",
        "request",
        "timed out",
    );

    assert_eq!(h.engine.report(report), ReportOutcome::Diverted);
    assert!(h.sink.is_empty());
    assert_eq!(h.diagnostics.len(), 1);
    assert!(h.diagnostics.records()[0].detail.contains("code"));
}

#[tokio::test(start_paused = true)]
async fn test_metrics_count_attempts_and_transitions() {
    let registry = prometheus::Registry::new();
    let metrics = ResilienceMetrics::new(&registry).unwrap();
    let h = harness(ResiliencePolicy::default().with_failure_threshold(1));
    let engine = h.engine.with_metrics(metrics);

    let _: Result<(), _> = engine
        .execute_with_resilience(|| async { Err(Fault::transient("x")) }, "Erp", "sync", None)
        .await;

    let families = registry.gather();
    let attempts = families
        .iter()
        .find(|f| f.get_name() == "sentinel_resilience_attempts_total")
        .unwrap();
    let total: f64 = attempts
        .get_metric()
        .iter()
        .map(|m| m.get_counter().get_value())
        .sum();
    assert_eq!(total, 3.0);
    assert!(families
        .iter()
        .any(|f| f.get_name() == "sentinel_resilience_circuit_transitions_total"));
}

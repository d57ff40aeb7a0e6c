//! Integration tests for TraceRecorder

use std::sync::Arc;

use sentinel_trace::{
    ExecutionStatus, MemoryDiagnostics, MemorySink, TelemetryEntry, TelemetryLevel,
    TelemetrySink, TraceRecorder, VerbosityFlag, EXECUTION_COMPLETED_KEY, EXECUTION_FAILED_KEY,
};

fn recorder() -> (TraceRecorder, MemorySink, MemoryDiagnostics) {
    let sink = MemorySink::new();
    let diagnostics = MemoryDiagnostics::new();
    let recorder = TraceRecorder::new(Arc::new(sink.clone()))
        .with_diagnostics(Arc::new(diagnostics.clone()));
    (recorder, sink, diagnostics)
}

#[tokio::test]
async fn test_success_returns_value_and_emits_one_performance_entry() {
    let (recorder, sink, _) = recorder();

    let result: Result<Vec<u8>, std::io::Error> = recorder
        .trace_execution("OpenAiDriver", "complete", || async { Ok(vec![1, 2, 3]) }, None)
        .await;

    assert_eq!(result.unwrap(), vec![1, 2, 3]);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.level, TelemetryLevel::Performance);
    assert_eq!(entry.status, Some(ExecutionStatus::Completed));
    assert_eq!(entry.message_key, EXECUTION_COMPLETED_KEY);
    assert_eq!(entry.apparatus, "OpenAiDriver");
    assert_eq!(entry.operation, "complete");
    assert!(entry.duration_ms.unwrap() >= 0.0);
    assert!(entry.trace_id.is_some());
}

#[tokio::test]
async fn test_failure_returns_identical_error_and_emits_one_error_entry() {
    let (recorder, sink, _) = recorder();

    let result: Result<(), anyhow::Error> = recorder
        .trace_execution(
            "MetaMessaging",
            "send",
            || async { Err(anyhow::anyhow!("socket closed").context("send failed")) },
            None,
        )
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "send failed");
    assert_eq!(err.root_cause().to_string(), "socket closed");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.level, TelemetryLevel::Error);
    assert_eq!(entry.status, Some(ExecutionStatus::Failed));
    assert_eq!(entry.message_key, EXECUTION_FAILED_KEY);
    assert_eq!(entry.error.as_deref(), Some("send failed"));
    assert!(entry.stack.as_deref().unwrap().contains("socket closed"));
}

#[tokio::test]
async fn test_metadata_is_attached() {
    let (recorder, sink, _) = recorder();
    let mut metadata = serde_json::Map::new();
    metadata.insert("tenant".into(), serde_json::json!("acme"));

    let _: Result<(), std::io::Error> = recorder
        .trace_execution("Erp", "sync", || async { Ok(()) }, Some(metadata))
        .await;

    let entry = &sink.entries()[0];
    assert_eq!(
        entry.metadata.as_ref().and_then(|m| m.get("tenant")),
        Some(&serde_json::json!("acme"))
    );
}

#[tokio::test]
async fn test_invalid_apparatus_goes_to_diagnostics_and_result_survives() {
    let (recorder, sink, diagnostics) = recorder();

    let result: Result<u8, std::io::Error> = recorder
        .trace_execution("", "op", || async { Ok(9) }, None)
        .await;

    assert_eq!(result.unwrap(), 9);
    assert!(sink.is_empty());
    let records = diagnostics.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].detail.contains("apparatus"));
}

#[test]
fn test_verbose_respects_flag() {
    let (recorder, sink, _) = recorder();
    let flag = VerbosityFlag::new(true);
    let recorder = recorder.with_verbosity(flag.clone());

    recorder.verbose("Triage", "score", "triage.scored", None);
    assert_eq!(sink.entries_at(TelemetryLevel::Verbose).len(), 1);

    flag.set(false);
    recorder.verbose("Triage", "score", "triage.scored", None);
    assert_eq!(sink.len(), 1);
}

struct PanickingSink;

impl TelemetrySink for PanickingSink {
    fn write(&self, _entry: &TelemetryEntry) {
        panic!("sink exploded");
    }
}

#[test]
fn test_panicking_sink_is_contained() {
    let diagnostics = MemoryDiagnostics::new();
    let recorder =
        TraceRecorder::new(Arc::new(PanickingSink)).with_diagnostics(Arc::new(diagnostics.clone()));

    recorder.information("Health", "report", "health.generated", None);

    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics.records()[0].context.contains("panicked"));
}

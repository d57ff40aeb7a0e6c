//! Integration tests for RequestBridge against a mock HTTP server

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use sentinel_bridge::{
    BridgeConfig, BridgeError, RequestBridge, StaticConfigLoader, INVALID_REQUEST_KEY, TIMEOUT_KEY,
    UNREACHABLE_KEY,
};
use sentinel_resilience::{ResilienceEngine, ResiliencePolicy};
use sentinel_trace::{MemorySink, TelemetryEntry, TelemetryLevel, TraceRecorder};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retries() -> ResiliencePolicy {
    ResiliencePolicy::default().with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

fn bridge(config: BridgeConfig) -> (RequestBridge, MemorySink) {
    let sink = MemorySink::new();
    let engine = Arc::new(ResilienceEngine::new(TraceRecorder::new(Arc::new(sink.clone()))));
    let bridge = RequestBridge::new(engine, StaticConfigLoader(config)).with_policy(fast_retries());
    (bridge, sink)
}

fn entries_with_key(sink: &MemorySink, key: &str) -> Vec<TelemetryEntry> {
    sink.entries()
        .into_iter()
        .filter(|e| e.message_key == key)
        .collect()
}

#[tokio::test]
async fn test_timeout_is_reported_and_releases_every_timer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let (bridge, sink) =
        bridge(BridgeConfig::new(server.uri()).with_timeout(Duration::from_millis(10)));

    let err = bridge
        .request("/v1/slow", "acme", &json!({ "ping": true }))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(bridge.pending_timers(), 0);

    let reports = entries_with_key(&sink, TIMEOUT_KEY);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].level, TelemetryLevel::Error);
    let metadata = reports[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["code"], "OS-NET-002");
    assert_eq!(metadata["context"]["attempts"], 3);
}

#[tokio::test]
async fn test_success_sends_json_and_tenant_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(header("X-Tenant-Id", "acme"))
        .and(header("content-type", "application/json"))
        .and(header("accept", "application/json"))
        .and(body_json(json!({ "sku": "A-1", "qty": 2 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "order_id": 42 })))
        .expect(1)
        .mount(&server)
        .await;

    let (bridge, sink) = bridge(BridgeConfig::new(server.uri()));

    let response = bridge
        .request("v1/orders", "acme", &json!({ "sku": "A-1", "qty": 2 }))
        .await
        .unwrap();

    assert_eq!(response, json!({ "order_id": 42 }));
    assert_eq!(bridge.pending_timers(), 0);

    let performance = sink.entries_at(TelemetryLevel::Performance);
    assert_eq!(performance.len(), 1);
    assert_eq!(performance[0].apparatus, "RequestBridge");
    assert_eq!(performance[0].operation, "v1/orders");
}

#[tokio::test]
async fn test_custom_tenant_header_and_get_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/inventory"))
        .and(header("X-Org", "globex"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (bridge, _) = bridge(BridgeConfig::new(server.uri()).with_tenant_header("X-Org"));

    let response = bridge
        .request_with_method("/v1/inventory", "globex", &json!({}), Method::GET)
        .await
        .unwrap();
    assert_eq!(response, serde_json::Value::Null);
}

#[tokio::test]
async fn test_client_error_is_fatal_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such route"))
        .expect(1)
        .mount(&server)
        .await;

    let (bridge, sink) = bridge(BridgeConfig::new(server.uri()));
    let err = bridge.request("/v1/missing", "acme", &json!({})).await.unwrap_err();

    match err {
        BridgeError::Status { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such route");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert_eq!(entries_with_key(&sink, "bridge.request.rejected").len(), 1);
}

#[tokio::test]
async fn test_server_error_and_429_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/throttled"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let (bridge, _) = bridge(BridgeConfig::new(server.uri()));
    assert_eq!(
        bridge.request("/v1/busy", "acme", &json!({})).await.unwrap_err().status(),
        Some(503)
    );
    assert_eq!(
        bridge.request("/v1/throttled", "acme", &json!({})).await.unwrap_err().status(),
        Some(429)
    );
}

#[tokio::test]
async fn test_refused_connection_is_reported_as_unreachable() {
    let address = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (bridge, sink) = bridge(BridgeConfig::new(format!("http://{}", address)));
    let err = bridge.request("/v1/send", "acme", &json!({})).await.unwrap_err();

    assert!(matches!(err, BridgeError::Connectivity { .. }));
    let reports = entries_with_key(&sink, UNREACHABLE_KEY);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].metadata.as_ref().unwrap()["code"], "OS-NET-001");
    assert_eq!(bridge.pending_timers(), 0);
}

#[tokio::test]
async fn test_config_is_loaded_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let loads = Arc::new(AtomicUsize::new(0));
    let counted = loads.clone();
    let uri = server.uri();
    let engine = Arc::new(ResilienceEngine::new(TraceRecorder::new(Arc::new(MemorySink::new()))));
    let bridge = RequestBridge::new(engine, move || {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok::<_, BridgeError>(BridgeConfig::new(uri.clone()))
    });

    bridge.request("/a", "acme", &json!({})).await.unwrap();
    bridge.request("/b", "acme", &json!({})).await.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_config_fails_fast_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (bridge, sink) = bridge(BridgeConfig::new(server.uri()).with_timeout(Duration::ZERO));
    let err = bridge.request("/v1/send", "acme", &json!({})).await.unwrap_err();

    assert!(matches!(err, BridgeError::Configuration(_)));
    let reports = entries_with_key(&sink, "bridge.config.invalid");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].metadata.as_ref().unwrap()["severity"], "CRITICAL");
}

#[tokio::test]
async fn test_blank_tenant_is_rejected_and_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (bridge, sink) = bridge(BridgeConfig::new(server.uri()));
    let err = bridge.request("/v1/send", " ", &json!({})).await.unwrap_err();

    assert!(matches!(err, BridgeError::InvalidRequest(_)));
    let reports = entries_with_key(&sink, INVALID_REQUEST_KEY);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].level, TelemetryLevel::Error);
    let metadata = reports[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["code"], "OS-VAL-001");
    assert_eq!(metadata["severity"], "HIGH");
}

#[tokio::test]
async fn test_invalid_tenant_header_value_is_reported() {
    let server = MockServer::start().await;
    let (bridge, sink) = bridge(BridgeConfig::new(server.uri()));

    let err = bridge
        .request("/v1/send", "acme\ncorp", &json!({}))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::InvalidRequest(_)));
    assert_eq!(entries_with_key(&sink, INVALID_REQUEST_KEY).len(), 1);
}

#[tokio::test]
async fn test_blank_endpoint_is_rejected_and_reported() {
    let server = MockServer::start().await;
    let (bridge, sink) = bridge(BridgeConfig::new(server.uri()));

    let err = bridge.request("  ", "acme", &json!({})).await.unwrap_err();

    assert!(matches!(err, BridgeError::InvalidRequest(_)));
    assert_eq!(entries_with_key(&sink, INVALID_REQUEST_KEY).len(), 1);
}

#[tokio::test]
async fn test_abandoned_request_releases_its_timer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let (bridge, _) = bridge(BridgeConfig::new(server.uri()).with_timeout(Duration::from_secs(5)));
    let payload = json!({"id": 1});

    let mut request = Box::pin(bridge.request("/v1/slow", "acme", &payload));
    tokio::select! {
        _ = &mut request => panic!("request finished before the mock responded"),
        _ = tokio::time::sleep(Duration::from_millis(200)) => {}
    }
    assert_eq!(bridge.pending_timers(), 1);

    drop(request);
    assert_eq!(bridge.pending_timers(), 0);
}

//! Browser automation transport tests against a mock WebDriver endpoint.

use std::sync::Arc;
use std::time::Duration;

use herald::transport::BrowserTransport;
use herald::{
    Dispatcher, Envelope, MemoryAuditLog, MemoryRegistry, Mode, Outcome, Recipient, Transport,
    TransportError,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn transport(server: &MockServer) -> BrowserTransport {
    BrowserTransport::new(server.uri())
        .web_client_url("https://web.example.com")
        .timings(
            Duration::from_secs(5),
            Duration::from_millis(1200),
            Duration::ZERO,
        )
}

fn null_value() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": null }))
}

async fn mount_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s-1", "capabilities": {} }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/timeouts"))
        .respond_with(null_value())
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/session/s-1"))
        .respond_with(null_value())
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// Flow Tests
// ============================================================================

#[tokio::test]
async fn full_flow_sends_and_closes_session() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/url"))
        .and(body_json(json!({
            "url": "https://web.example.com/send?phone=201234567890&text=Report%20ready"
        })))
        .respond_with(null_value())
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "value": { "element-6066-11e4-a52e-4f735466cecf": "el-7" }
            })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/element/el-7/value"))
        .and(body_json(json!({ "text": "\u{E007}" })))
        .respond_with(null_value())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = transport(&server).attempt("+20 123 456 7890", "Report ready").await;
    assert_eq!(outcome, Outcome::Sent { reference: None });
}

#[tokio::test]
async fn missing_compose_box_fails_and_closes_session() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/url"))
        .respond_with(null_value())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "Unable to locate element" }
        })))
        .mount(&server)
        .await;

    let outcome = transport(&server).attempt("201234567890", "hi").await;
    let err = outcome.error().unwrap();
    assert!(matches!(err, TransportError::Automation(_)));
    assert!(err.to_string().contains("compose box not found"), "{err}");
}

#[tokio::test]
async fn session_creation_failure_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "session not created", "message": "Chrome failed to start" }
        })))
        .mount(&server)
        .await;

    let err = transport(&server)
        .attempt("201234567890", "hi")
        .await
        .error()
        .cloned()
        .unwrap();
    assert!(err.to_string().contains("Chrome failed to start"), "{err}");
}

#[tokio::test]
async fn navigation_error_still_closes_session() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/url"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "unknown error", "message": "net::ERR_NAME_NOT_RESOLVED" }
        })))
        .mount(&server)
        .await;

    let outcome = transport(&server).attempt("201234567890", "hi").await;
    assert!(outcome
        .error()
        .unwrap()
        .to_string()
        .starts_with("navigate: unknown error"));
}

// ============================================================================
// Availability Tests
// ============================================================================

#[tokio::test]
async fn unavailable_engine_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(null_value())
        .expect(0)
        .mount(&server)
        .await;

    let outcome = transport(&server)
        .available(false)
        .attempt("201234567890", "hi")
        .await;
    assert!(outcome.error().unwrap().is_unavailable());
    assert!(outcome
        .error()
        .unwrap()
        .to_string()
        .starts_with("browser_not_available"));
}

#[tokio::test]
async fn destination_without_digits_fails() {
    let server = MockServer::start().await;
    let outcome = transport(&server).attempt("n/a", "hi").await;
    assert!(matches!(outcome.error(), Some(TransportError::Automation(_))));
}

#[tokio::test]
async fn attempt_timeout_still_deletes_session() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/url"))
        .respond_with(null_value().set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let audit = MemoryAuditLog::shared();
    let dispatcher = Dispatcher::builder(MemoryRegistry::shared(), audit.clone())
        .web(Arc::new(transport(&server)))
        .attempt_timeout(Duration::from_millis(300))
        .build();

    let delivery = dispatcher
        .dispatch_one(
            Envelope::new(Recipient::phone("+201234567890"), "Report ready"),
            Mode::Web,
        )
        .await
        .unwrap();
    assert!(!delivery.delivered());
    assert_eq!(delivery.error.as_deref(), Some("timeout after 300ms"));

    // The aborted attempt hands the delete to the runtime.
    let mut deletes = 0;
    for _ in 0..40 {
        let requests = server.received_requests().await.unwrap_or_default();
        deletes = requests
            .iter()
            .filter(|r| r.method.as_str() == "DELETE" && r.url.path() == "/session/s-1")
            .count();
        if deletes > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn status_check_reads_ready_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "ready": true, "message": "ready to create sessions" }
        })))
        .mount(&server)
        .await;

    let browser = transport(&server).detect().await;
    assert!(browser.is_available());
}

#[tokio::test]
async fn status_check_of_missing_endpoint_is_unavailable() {
    let browser = BrowserTransport::new("http://127.0.0.1:1").detect().await;
    assert!(!browser.is_available());
}

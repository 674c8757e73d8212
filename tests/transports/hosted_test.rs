//! Hosted gateway transport tests.

use herald::transport::HostedGateway;
use herald::{Account, AccountRegistry, MemoryRegistry, NewAccount, Outcome, Transport, TransportError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn account(endpoint_id: &str, token: &str) -> Account {
    MemoryRegistry::new().register(
        NewAccount::new()
            .name("Front desk")
            .credential(endpoint_id, token)
            .hosted(true),
    )
}

fn gateway(server: &MockServer) -> HostedGateway {
    HostedGateway::new().base_url(server.uri())
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "input": "201234567890", "wa_id": "201234567890" }],
        "messages": [{ "id": "wamid.HBgLMjAxMjM0NTY3ODkwFQIAERgS" }]
    }))
}

// ============================================================================
// Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_reference() {
    let server = MockServer::start().await;
    let transport = gateway(&server).for_account(&account("1098765", "EAAG-token"));

    Mock::given(method("POST"))
        .and(path("/v17.0/1098765/messages"))
        .and(header("Authorization", "Bearer EAAG-token"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "messaging_product": "whatsapp",
            "to": "+201234567890",
            "type": "text",
            "text": { "body": "Ahmed scored 18/20 this week." }
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = transport
        .attempt("+201234567890", "Ahmed scored 18/20 this week.")
        .await;

    assert_eq!(
        outcome,
        Outcome::Sent {
            reference: Some("wamid.HBgLMjAxMjM0NTY3ODkwFQIAERgS".to_string())
        }
    );
}

#[tokio::test]
async fn created_status_counts_as_sent() {
    let server = MockServer::start().await;
    let transport = gateway(&server).for_account(&account("1", "t"));

    Mock::given(method("POST"))
        .and(path("/v17.0/1/messages"))
        .respond_with(ResponseTemplate::new(201).set_body_string("accepted"))
        .mount(&server)
        .await;

    let outcome = transport.attempt("555", "hi").await;
    assert_eq!(outcome, Outcome::Sent { reference: None });
}

#[tokio::test]
async fn version_and_product_are_configurable() {
    let server = MockServer::start().await;
    let transport = gateway(&server)
        .version("v19.0")
        .product("chat")
        .for_account(&account("42", "t"));

    Mock::given(method("POST"))
        .and(path("/v19.0/42/messages"))
        .and(body_json(json!({
            "messaging_product": "chat",
            "to": "555",
            "type": "text",
            "text": { "body": "hi" }
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(transport.attempt("555", "hi").await.is_sent());
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[tokio::test]
async fn rejected_request_carries_response_body() {
    let server = MockServer::start().await;
    let transport = gateway(&server).for_account(&account("1", "bad"));

    Mock::given(method("POST"))
        .and(path("/v17.0/1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid token"))
        .mount(&server)
        .await;

    let outcome = transport.attempt("555", "hi").await;
    let err = outcome.error().unwrap();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Invalid token");
}

#[tokio::test]
async fn server_error_is_failure() {
    let server = MockServer::start().await;
    let transport = gateway(&server).for_account(&account("1", "t"));

    Mock::given(method("POST"))
        .and(path("/v17.0/1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "Service temporarily unavailable", "code": 2 }
        })))
        .mount(&server)
        .await;

    let err = transport.attempt("555", "hi").await.error().cloned().unwrap();
    assert!(matches!(err, TransportError::Rejected { status: 500, .. }));
    assert!(err.to_string().contains("Service temporarily unavailable"));
}

#[tokio::test]
async fn missing_token_fails_without_request() {
    let server = MockServer::start().await;
    let account = MemoryRegistry::new().register(NewAccount::new().hosted(true));
    let transport = gateway(&server).for_account(&account);

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let outcome = transport.attempt("555", "hi").await;
    assert_eq!(outcome, Outcome::Failed(TransportError::MissingCredentials));
}

#[tokio::test]
async fn unreachable_gateway_is_network_failure() {
    let transport = HostedGateway::new()
        .base_url("http://127.0.0.1:1")
        .for_account(&account("1", "t"));

    let err = transport.attempt("555", "hi").await.error().cloned().unwrap();
    assert!(matches!(err, TransportError::Network(_)));
}

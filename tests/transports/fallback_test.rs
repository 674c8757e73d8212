//! Web fallback chain tests with the real web transports.

use std::sync::Arc;

use herald::transport::{BrowserTransport, Fallback, OpenerTransport};
use herald::{Outcome, Transport, TransportError};

fn browser_down() -> Arc<dyn Transport> {
    Arc::new(BrowserTransport::default().available(false))
}

#[test]
fn chain_order_and_name() {
    let chain = Fallback::new(browser_down()).then(Arc::new(OpenerTransport::new("true")));
    assert_eq!(chain.names(), vec!["browser", "opener"]);
    assert_eq!(chain.name(), "web");
    assert!(chain.is_available());
}

#[cfg(unix)]
#[tokio::test]
async fn falls_through_to_opener() {
    let chain = Fallback::new(browser_down()).then(Arc::new(OpenerTransport::new("true")));
    assert_eq!(
        chain.attempt("201234567890", "hi").await,
        Outcome::Sent { reference: None }
    );
}

#[tokio::test]
async fn both_unavailable_reports_each_engine() {
    let chain = Fallback::new(browser_down())
        .then(Arc::new(OpenerTransport::new("true").available(false)));
    assert!(!chain.is_available());

    let err = chain.attempt("201234567890", "hi").await.error().cloned().unwrap();
    assert!(matches!(err, TransportError::Exhausted(ref errors) if errors.len() == 2));

    let text = err.to_string();
    assert!(text.starts_with("browser_err=browser_not_available"), "{text}");
    assert!(text.contains("|opener_err=opener_not_available"), "{text}");
}

#[tokio::test]
async fn single_engine_error_is_unwrapped() {
    let chain = Fallback::new(browser_down());
    let err = chain.attempt("201234567890", "hi").await.error().cloned().unwrap();
    assert!(err.is_unavailable());
}

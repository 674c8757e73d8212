//! Log-only transport tests.

use herald::transport::LogOnlyTransport;
use herald::{Outcome, Transport};

#[tokio::test]
async fn never_delivers() {
    let transport = LogOnlyTransport::new();
    assert_eq!(transport.attempt("+201234567890", "hello").await, Outcome::Skipped);
    assert_eq!(transport.name(), "log_only");
    assert!(transport.is_available());
}

#[tokio::test]
async fn full_logging_still_skips() {
    let transport = LogOnlyTransport::full();
    assert_eq!(transport.attempt("", "").await, Outcome::Skipped);
}

//! Opener fallback transport tests.

use std::time::Duration;

use herald::transport::OpenerTransport;
use herald::{Outcome, Transport, TransportError};

#[tokio::test]
async fn missing_program_is_unavailable() {
    let opener = OpenerTransport::new("herald-no-such-opener-program");
    assert!(!opener.check_ready());

    let outcome = opener.attempt("201234567890", "hi").await;
    assert!(outcome.error().unwrap().is_unavailable());
}

#[tokio::test]
async fn detect_marks_missing_program() {
    let opener = OpenerTransport::new("herald-no-such-opener-program").detect();
    assert!(!opener.is_available());

    let outcome = opener.attempt("201234567890", "hi").await;
    assert_eq!(
        outcome.error().unwrap().to_string(),
        "opener_not_available: herald-no-such-opener-program not found"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn successful_program_is_sent() {
    let outcome = OpenerTransport::new("true").attempt("201234567890", "hi").await;
    assert_eq!(outcome, Outcome::Sent { reference: None });
}

#[cfg(unix)]
#[tokio::test]
async fn failing_program_is_automation_failure() {
    let outcome = OpenerTransport::new("false").attempt("201234567890", "hi").await;
    let err = outcome.error().unwrap();
    assert!(matches!(err, TransportError::Automation(_)));
    assert!(err.to_string().starts_with("false exited with"), "{err}");
}

#[cfg(unix)]
#[tokio::test]
async fn slow_program_times_out() {
    let outcome = OpenerTransport::new("sh")
        .args(["-c", "sleep 5", "sh"])
        .timeout(Duration::from_millis(200))
        .attempt("201234567890", "hi")
        .await;
    assert!(matches!(outcome.error(), Some(TransportError::Timeout(_))));
}

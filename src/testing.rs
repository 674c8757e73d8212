//! Testing utilities and assertion helpers.
//!
//! Assertions over any [`AuditLog`], so the same checks work against the
//! in-memory log and a file-backed one.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald::testing::*;
//! use herald::{AttemptStatus, MemoryAuditLog};
//!
//! #[tokio::test]
//! async fn test_report_flow() {
//!     let audit = MemoryAuditLog::shared();
//!
//!     // ... dispatch through a Dispatcher built over `audit` ...
//!
//!     assert_attempt_count(audit.as_ref(), 2);
//!     assert_attempt_to(audit.as_ref(), "+201234567890");
//!     assert_all_status(audit.as_ref(), AttemptStatus::Pending);
//!     refute_attempt_to(audit.as_ref(), "+209999999999");
//!
//!     // Regex matching against the newest entry's error
//!     assert_error_matches(audit.as_ref(), r"^timeout after \d+m?s$");
//! }
//! ```

use regex::Regex;

use crate::audit::{AttemptStatus, AuditLog, DeliveryAttempt};

// ============================================================================
// Helper Functions
// ============================================================================

/// Every entry in the log, newest first.
fn entries(log: &dyn AuditLog) -> Vec<DeliveryAttempt> {
    log.recent(log.count())
}

/// Format a list of entries for error messages.
fn format_attempt_summary(attempts: &[DeliveryAttempt]) -> String {
    if attempts.is_empty() {
        return "  (no attempts recorded)".to_string();
    }

    attempts
        .iter()
        .map(|a| {
            let error = a.error.as_deref().unwrap_or("-");
            format!(
                "  #{} To: {}, Via: {}, Status: {}, Error: {}",
                a.id, a.destination, a.transport, a.status, error
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert the exact number of recorded attempts.
///
/// # Panics
///
/// Panics if the count doesn't match.
pub fn assert_attempt_count(log: &dyn AuditLog, expected: usize) {
    let attempts = entries(log);

    assert_eq!(
        attempts.len(),
        expected,
        "Expected {} attempt(s), but {} were recorded.\n\nAttempts:\n{}",
        expected,
        attempts.len(),
        format_attempt_summary(&attempts)
    );
}

/// Assert that an attempt was recorded for a destination.
///
/// # Panics
///
/// Panics if no entry has that destination.
pub fn assert_attempt_to(log: &dyn AuditLog, destination: &str) {
    let attempts = entries(log);
    let found = attempts.iter().any(|a| a.destination == destination);

    assert!(
        found,
        "Expected an attempt to '{}'.\n\nAttempts:\n{}",
        destination,
        format_attempt_summary(&attempts)
    );
}

/// Assert that no attempt was recorded for a destination.
///
/// # Panics
///
/// Panics if an entry has that destination.
pub fn refute_attempt_to(log: &dyn AuditLog, destination: &str) {
    let attempts = entries(log);

    if let Some(found) = attempts.iter().find(|a| a.destination == destination) {
        panic!(
            "Expected no attempt to '{}', but found #{} ({}).\n\nAttempts:\n{}",
            destination,
            found.id,
            found.status,
            format_attempt_summary(&attempts)
        );
    }
}

/// Assert that every recorded attempt has `status`.
///
/// # Panics
///
/// Panics if the log is empty or any entry has another status.
pub fn assert_all_status(log: &dyn AuditLog, status: AttemptStatus) {
    let attempts = entries(log);
    assert!(
        !attempts.is_empty(),
        "Expected attempts with status '{}', but none were recorded",
        status
    );

    let others: Vec<DeliveryAttempt> = attempts
        .iter()
        .filter(|a| a.status != status)
        .cloned()
        .collect();

    assert!(
        others.is_empty(),
        "Expected every attempt to be '{}'.\n\nOther attempts:\n{}",
        status,
        format_attempt_summary(&others)
    );
}

/// Assert the newest entry's error matches a regex pattern.
///
/// # Panics
///
/// Panics if nothing was recorded, the newest entry has no error, or the
/// error doesn't match.
pub fn assert_error_matches(log: &dyn AuditLog, pattern: &str) {
    let last = log
        .recent(1)
        .pop()
        .expect("Expected at least one attempt to be recorded, but none were");
    let re = Regex::new(pattern).expect("Invalid regex pattern");
    let error = last.error.as_deref().unwrap_or("");

    assert!(
        re.is_match(error),
        "Expected error to match pattern '{}', but was '{}'.\n\nLast attempt:\n{}",
        pattern,
        error,
        format_attempt_summary(std::slice::from_ref(&last))
    );
}

/// Entries recorded for a destination, newest first.
pub fn attempts_to(log: &dyn AuditLog, destination: &str) -> Vec<DeliveryAttempt> {
    entries(log)
        .into_iter()
        .filter(|a| a.destination == destination)
        .collect()
}

//! Error types for herald.
//!
//! There are two layers. [`HeraldError`] is what a caller sees when a whole
//! request cannot proceed. [`TransportError`] describes why one delivery
//! attempt failed; it never escapes as an `Err`, it is carried inside
//! [`Outcome::Failed`](crate::transport::Outcome) and written to the audit log.

use std::time::Duration;

use thiserror::Error;

use crate::account::AccountId;
use crate::recipient::RecipientId;

/// Request-level errors returned by the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum HeraldError {
    /// No dispatcher has been configured.
    #[error("Dispatcher not configured")]
    NotConfigured,

    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Explicit `auto` mode for a single recipient, but no hosted account exists.
    #[error("no_auto_account_configured")]
    NoHostedAccount,

    /// The directory has no recipient with this id.
    #[error("recipient_not_found: {0}")]
    RecipientNotFound(RecipientId),

    /// The registry has no account with this id.
    #[error("account_not_found: {0}")]
    AccountNotFound(AccountId),

    /// Neither a recipient nor a group was given.
    #[error("no_target")]
    NoTarget,

    /// Audit log or registry backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HeraldError {
    /// Short machine-readable code, as exposed by the JSON API.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Configuration(_) => "configuration_error",
            Self::NoHostedAccount => "no_auto_account_configured",
            Self::RecipientNotFound(_) => "recipient_not_found",
            Self::AccountNotFound(_) => "account_not_found",
            Self::NoTarget => "no_target",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for HeraldError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for HeraldError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Why a single transport attempt did not deliver.
///
/// The `Display` form is exactly what lands in the audit entry's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The automation engine this transport needs is not present.
    #[error("{transport}_not_available: {reason}")]
    Unavailable {
        transport: &'static str,
        reason: String,
    },

    /// The hosted account has no endpoint id or no token.
    #[error("missing_credentials")]
    MissingCredentials,

    /// The remote side answered with a non-success status.
    #[error("{body}")]
    Rejected { status: u16, body: String },

    /// Connection, DNS, TLS or protocol failure.
    #[error("{0}")]
    Network(String),

    /// The attempt did not finish within its bound.
    #[error("timeout after {}", format_bound(.0))]
    Timeout(Duration),

    /// The automation engine was reachable but the page flow failed.
    #[error("{0}")]
    Automation(String),

    /// The attempt task died before producing an outcome.
    #[error("aborted: {0}")]
    Aborted(String),

    /// Every transport in a fallback chain failed.
    #[error("{}", format_exhausted(.0))]
    Exhausted(Vec<(&'static str, TransportError)>),
}

impl TransportError {
    /// Create an unavailable-engine error.
    pub fn unavailable(transport: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            transport,
            reason: reason.into(),
        }
    }

    /// Whether this is the `library_unavailable` signal.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// HTTP status, if the remote side answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Whole seconds as `Ns`, anything finer as `Nms`.
fn format_bound(bound: &Duration) -> String {
    if bound.subsec_nanos() == 0 {
        format!("{}s", bound.as_secs())
    } else {
        format!("{}ms", bound.as_millis())
    }
}

fn format_exhausted(errors: &[(&'static str, TransportError)]) -> String {
    errors
        .iter()
        .map(|(name, err)| format!("{name}_err={err}"))
        .collect::<Vec<_>>()
        .join("|")
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Automation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_displays_body_only() {
        let err = TransportError::Rejected {
            status: 401,
            body: "Invalid token".into(),
        };
        assert_eq!(err.to_string(), "Invalid token");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_unavailable_display() {
        let err = TransportError::unavailable("browser", "webdriver not reachable");
        assert!(err.is_unavailable());
        assert_eq!(
            err.to_string(),
            "browser_not_available: webdriver not reachable"
        );
    }

    #[test]
    fn test_exhausted_concatenates() {
        let err = TransportError::Exhausted(vec![
            ("browser", TransportError::unavailable("browser", "down")),
            ("opener", TransportError::Automation("exit status 1".into())),
        ]);
        assert_eq!(
            err.to_string(),
            "browser_err=browser_not_available: down|opener_err=exit status 1"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = TransportError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "timeout after 15s");
    }

    #[test]
    fn test_sub_second_timeout_display() {
        let err = TransportError::Timeout(Duration::from_millis(300));
        assert_eq!(err.to_string(), "timeout after 300ms");

        let err = TransportError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timeout after 1500ms");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(HeraldError::NoHostedAccount.code(), "no_auto_account_configured");
        assert_eq!(HeraldError::NoHostedAccount.to_string(), "no_auto_account_configured");
        assert_eq!(HeraldError::NoTarget.code(), "no_target");
    }
}

//! Transport trait, attempt outcomes, and the delivery channels.
//!
//! # Why `async_trait`?
//!
//! The dispatcher holds its channels as `Arc<dyn Transport>` and chains them
//! at runtime (see [`Fallback`]). Native async traits are not object-safe, so
//! the futures are boxed. Every attempt is network- or browser-bound; the
//! allocation is not measurable next to that.
//!
//! ## Available Transports
//!
//! | Transport | Name | Description |
//! |-----------|------|-------------|
//! | [`HostedTransport`] | `hosted` | Authenticated POST to the hosted messaging gateway |
//! | [`BrowserTransport`] | `browser` | Headless browser driven over WebDriver |
//! | [`OpenerTransport`] | `opener` | Hands the deep link to an external driver program |
//! | [`LogOnlyTransport`] | `log_only` | No network action; audit trail only |
//! | [`Fallback`] | `web` | Tries each inner transport until one delivers |

use async_trait::async_trait;

use crate::error::TransportError;

mod browser;
mod fallback;
mod hosted;
mod log_only;
mod opener;

pub use browser::BrowserTransport;
pub use fallback::Fallback;
pub use hosted::{HostedGateway, HostedTransport};
pub use log_only::LogOnlyTransport;
pub use opener::OpenerTransport;

/// Result of one transport attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The channel accepted the message.
    Sent {
        /// Provider-assigned message id, if any.
        reference: Option<String>,
    },
    /// No delivery was attempted; the record exists for the audit trail.
    Skipped,
    /// The attempt failed.
    Failed(TransportError),
}

impl Outcome {
    /// Sent with no provider reference.
    pub fn sent() -> Self {
        Self::Sent { reference: None }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Result<Option<String>, TransportError>> for Outcome {
    fn from(result: Result<Option<String>, TransportError>) -> Self {
        match result {
            Ok(reference) => Self::Sent { reference },
            Err(err) => Self::Failed(err),
        }
    }
}

/// A delivery channel.
///
/// `attempt` never fails as a Rust error: every fault, including a missing
/// automation engine, is reported through [`Outcome::Failed`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Try to deliver `message` to `destination`.
    async fn attempt(&self, destination: &str, message: &str) -> Outcome;

    /// Short name recorded in the audit log.
    fn name(&self) -> &'static str;

    /// Result of the startup capability check.
    ///
    /// An unavailable transport still answers `attempt`, with
    /// [`TransportError::Unavailable`], so callers branch instead of
    /// catching errors.
    fn is_available(&self) -> bool {
        true
    }
}

/// Build the web client deep link for a destination and message.
///
/// Only the digits of the destination are kept; the message is URL-encoded.
///
/// ```rust
/// let link = herald::transport::deep_link("https://web.example.com", "+20 123-456", "hi there");
/// assert_eq!(link, "https://web.example.com/send?phone=20123456&text=hi%20there");
/// ```
pub fn deep_link(web_client_url: &str, destination: &str, message: &str) -> String {
    format!(
        "{}/send?phone={}&text={}",
        web_client_url.trim_end_matches('/'),
        digits(destination),
        urlencoding::encode(message)
    )
}

/// The ASCII digits of a phone string.
pub(crate) fn digits(destination: &str) -> String {
    destination.chars().filter(char::is_ascii_digit).collect()
}

//! Log-only transport.
//!
//! Performs no network action. The dispatcher uses it when no delivery
//! channel applies, so the message still leaves an audit trail as `pending`.

use async_trait::async_trait;

use super::{Outcome, Transport};

/// Transport that emits tracing events and never delivers.
#[derive(Debug, Clone)]
pub struct LogOnlyTransport {
    /// If true, log the message body too. If false, just destination and length.
    log_full: bool,
}

impl LogOnlyTransport {
    /// Brief output (destination and message length).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Also log the message body at debug level.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    /// Set whether to log the message body.
    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }
}

impl Default for LogOnlyTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LogOnlyTransport {
    async fn attempt(&self, destination: &str, message: &str) -> Outcome {
        tracing::info!(
            destination = %destination,
            chars = message.chars().count(),
            "Message recorded without delivery"
        );
        if self.log_full {
            tracing::debug!(body = %message, "Message body");
        }
        Outcome::Skipped
    }

    fn name(&self) -> &'static str {
        "log_only"
    }
}

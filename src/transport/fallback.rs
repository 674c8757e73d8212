//! Ordered fallback across transports.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use herald::transport::{BrowserTransport, Fallback, OpenerTransport};
//!
//! let web = Fallback::new(Arc::new(BrowserTransport::default()))
//!     .then(Arc::new(OpenerTransport::default()));
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;

use super::{Outcome, Transport};

/// Tries each transport in order and stops at the first that does not fail.
///
/// An unavailable transport is not a stop: its
/// [`Unavailable`](TransportError::Unavailable) outcome is recorded and the
/// next one runs. When every transport fails, a chain of one reports that
/// error as is; longer chains report
/// [`Exhausted`](TransportError::Exhausted) with all of them.
#[derive(Clone)]
pub struct Fallback {
    chain: Vec<Arc<dyn Transport>>,
}

impl Fallback {
    pub fn new(first: Arc<dyn Transport>) -> Self {
        Self { chain: vec![first] }
    }

    /// Append a transport to try after the ones already in the chain.
    pub fn then(mut self, next: Arc<dyn Transport>) -> Self {
        self.chain.push(next);
        self
    }

    /// Names of the chained transports, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fallback").field("chain", &self.names()).finish()
    }
}

#[async_trait]
impl Transport for Fallback {
    async fn attempt(&self, destination: &str, message: &str) -> Outcome {
        let mut errors = Vec::with_capacity(self.chain.len());

        for transport in &self.chain {
            match transport.attempt(destination, message).await {
                Outcome::Failed(err) => {
                    tracing::debug!(
                        transport = transport.name(),
                        error = %err,
                        "Transport failed, falling through"
                    );
                    errors.push((transport.name(), err));
                }
                done => return done,
            }
        }

        if errors.len() == 1 {
            let (_, err) = errors.remove(0);
            Outcome::Failed(err)
        } else {
            Outcome::Failed(TransportError::Exhausted(errors))
        }
    }

    fn name(&self) -> &'static str {
        "web"
    }

    fn is_available(&self) -> bool {
        self.chain.iter().any(|t| t.is_available())
    }
}

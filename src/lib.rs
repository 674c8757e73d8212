//! # Herald
//!
//! Deliver per-recipient notifications to a guardian's phone over chat
//! channels, and keep an append-only record of every attempt.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::{Envelope, Mode, NewAccount, Recipient};
//!
//! herald::init().await?;
//! let dispatcher = herald::dispatcher()?;
//!
//! dispatcher.accounts().register(
//!     NewAccount::new()
//!         .name("Front desk")
//!         .credential("1234567890", "EAAG...")
//!         .hosted(true),
//! );
//!
//! let delivery = dispatcher
//!     .dispatch_one(Envelope::new(Recipient::phone("+201234567890"), "Report"), Mode::Default)
//!     .await?;
//! ```
//!
//! ## Routing
//!
//! | Condition | Transport |
//! |-----------|-----------|
//! | A hosted-capable account exists (any mode) | hosted gateway |
//! | `web`, or `auto` with no hosted account | browser automation, then the opener fallback |
//! | otherwise | log-only (`pending` entry) |
//!
//! A single-recipient dispatch with explicit `auto` and no hosted account is
//! refused with [`HeraldError::NoHostedAccount`] and records nothing.
//!
//! ## Environment Variables
//!
//! See [`HeraldConfig`] for the full table (`HERALD_GATEWAY_URL`,
//! `HERALD_WEBDRIVER_URL`, `HERALD_OPENER`, `HERALD_WORKERS`,
//! `HERALD_ATTEMPT_TIMEOUT_SECS`, `HERALD_AUDIT_PATH`, ...).
//!
//! ## Feature Flags
//!
//! - `api` - Axum JSON router for accounts, dispatch and the audit log
//! - `testing` - Assertion helpers over an audit log
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `herald_attempts_total` | Counter | transport, status | Attempts recorded |
//! | `herald_attempt_duration_seconds` | Histogram | transport | Attempt duration |
//! | `herald_batch_size` | Histogram | | Recipients per group dispatch |

/// The version of the herald crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod account;
mod audit;
mod config;
mod dispatcher;
mod error;
mod recipient;
mod registry;

pub mod policy;
pub mod transport;

#[cfg(feature = "api")]
pub mod api;

#[cfg(feature = "testing")]
pub mod testing;

use parking_lot::RwLock;
use std::sync::Arc;

// Re-exports
pub use account::{Account, AccountId, Credential, NewAccount};
pub use audit::{
    AttemptId, AttemptStatus, AuditLog, DeliveryAttempt, FileAuditLog, MemoryAuditLog, NewAttempt,
};
pub use config::HeraldConfig;
pub use dispatcher::{Delivery, Dispatcher, DispatcherBuilder, GroupReport, Report, Request};
pub use error::{HeraldError, TransportError};
pub use policy::{Mode, Route};
pub use recipient::{Compose, Directory, Envelope, GroupId, Recipient, RecipientId, Target};
pub use registry::{AccountRegistry, MemoryRegistry};
pub use transport::{Outcome, Transport};

// ============================================================================
// Global Dispatcher
// ============================================================================

/// Global dispatcher - swappable for testing
static DISPATCHER: RwLock<Option<Arc<Dispatcher>>> = RwLock::new(None);

/// Build the global dispatcher from environment variables.
///
/// Checks the automation engines once. Calling it again replaces the
/// dispatcher, and with it the in-memory registry.
///
/// ```rust,ignore
/// // In main.rs
/// herald::init().await?;
/// ```
pub async fn init() -> Result<(), HeraldError> {
    let config = HeraldConfig::from_env();
    let dispatcher = Dispatcher::from_config(&config).await?;
    tracing::info!(
        workers = config.workers,
        audit = ?config.audit_path,
        "Herald dispatcher initialized"
    );
    configure(dispatcher);
    Ok(())
}

/// Get the configured dispatcher.
pub fn dispatcher() -> Result<Arc<Dispatcher>, HeraldError> {
    DISPATCHER
        .read()
        .as_ref()
        .cloned()
        .ok_or(HeraldError::NotConfigured)
}

/// Check if a dispatcher is configured.
pub fn is_configured() -> bool {
    DISPATCHER.read().is_some()
}

/// Manually configure the global dispatcher.
///
/// Later calls replace the previous dispatcher.
pub fn configure(dispatcher: Dispatcher) {
    *DISPATCHER.write() = Some(Arc::new(dispatcher));
}

/// Reset the global dispatcher (useful for tests).
pub fn reset() {
    *DISPATCHER.write() = None;
}

/// Dispatch through the global dispatcher.
pub async fn dispatch(request: Request, mode: Mode) -> Result<Report, HeraldError> {
    dispatcher()?.dispatch(request, mode).await
}

/// Recent audit entries from the global dispatcher, newest first.
pub fn recent_attempts(limit: usize) -> Result<Vec<DeliveryAttempt>, HeraldError> {
    Ok(dispatcher()?.recent_attempts(limit))
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::AccountRegistry;
    pub use crate::AuditLog;
    pub use crate::Delivery;
    pub use crate::Dispatcher;
    pub use crate::Envelope;
    pub use crate::HeraldError;
    pub use crate::Mode;
    pub use crate::NewAccount;
    pub use crate::Recipient;
    pub use crate::Transport;
    pub use crate::{dispatch, dispatcher, is_configured, recent_attempts};
}

//! JSON admin API.
//!
//! Provides an Axum router over a [`Dispatcher`]: account management,
//! dispatch, direct web sends, and the audit log.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald::api::router;
//! use axum::Router;
//!
//! let dispatcher = herald::dispatcher()?;
//! let app = Router::new().nest("/api/wa", router((*dispatcher).clone()));
//! ```

mod routes;

use axum::Router;

use crate::dispatcher::Dispatcher;

pub use routes::{SendRequest, WebSendRequest};

/// Create an Axum router for the admin API.
///
/// ## Routes
///
/// | Method | Path | Description |
/// |--------|------|-------------|
/// | POST | `/accounts` | Register an account |
/// | GET | `/accounts` | List accounts, newest first |
/// | DELETE | `/accounts/{id}` | Remove an account |
/// | POST | `/send` | Dispatch to one recipient or a group |
/// | POST | `/send/web` | Send through web automation directly |
/// | GET | `/logs?limit=200` | Audit entries, newest first |
/// | POST | `/recipients/{id}/forget` | Clear a deleted recipient from the audit log |
///
/// Request-level failures answer `{"ok": false, "error": "<code>"}`; for
/// example explicit `auto` with no hosted account is a 400 with
/// `no_auto_account_configured`.
pub fn router(dispatcher: Dispatcher) -> Router {
    routes::create_router(dispatcher)
}

/// Axum types used by the router, for callers and tests.
pub mod reexports {
    pub use axum::body::Body;
    pub use axum::http::{header, Method, Request, StatusCode};
}

//! Route handlers for the admin API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::account::{Account, AccountId, NewAccount};
use crate::audit::DeliveryAttempt;
use crate::dispatcher::{Dispatcher, Report, Request};
use crate::error::HeraldError;
use crate::policy::Mode;
use crate::recipient::{Envelope, Recipient, RecipientId};

const DEFAULT_LOG_LIMIT: usize = 200;

/// Shared state for routes.
#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
}

/// Create the admin router.
pub fn create_router(dispatcher: Dispatcher) -> Router {
    let state = AppState { dispatcher };

    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/{id}", delete(delete_account))
        .route("/send", post(send))
        .route("/send/web", post(send_web))
        .route("/logs", get(logs))
        .route("/recipients/{id}/forget", post(forget_recipient))
        .with_state(state)
}

// ============================================================================
// Request Types
// ============================================================================

/// Body of `POST /send`.
///
/// Exactly one of `recipient` (with `message`) or `group` is expected.
#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub recipient: Option<Recipient>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub group: Option<Vec<Envelope>>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl SendRequest {
    fn into_request(self) -> Result<(Request, Mode), HeraldError> {
        let mode = Mode::from_param(self.mode.as_deref());
        match (self.recipient, self.group) {
            (Some(recipient), _) => {
                let message = self.message.unwrap_or_default();
                Ok((Request::One(Envelope::new(recipient, message)), mode))
            }
            (None, Some(group)) => Ok((Request::Group(group), mode)),
            (None, None) => Err(HeraldError::NoTarget),
        }
    }
}

/// Body of `POST /send/web`.
#[derive(Debug, Deserialize)]
pub struct WebSendRequest {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
struct LogsQuery {
    limit: Option<usize>,
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError(HeraldError);

impl From<HeraldError> for ApiError {
    fn from(err: HeraldError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            HeraldError::NoHostedAccount | HeraldError::NoTarget => StatusCode::BAD_REQUEST,
            HeraldError::RecipientNotFound(_) | HeraldError::AccountNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "ok": false, "error": self.0.code() });
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /accounts - Register an account.
async fn create_account(
    State(state): State<AppState>,
    Json(account): Json<NewAccount>,
) -> Json<Value> {
    let account = state.dispatcher.accounts().register(account);
    Json(json!({ "ok": true, "id": account.id }))
}

/// GET /accounts - List accounts, newest first. Tokens are never included.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<Account>> {
    Json(state.dispatcher.accounts().list())
}

/// DELETE /accounts/{id} - Remove an account.
async fn delete_account(State(state): State<AppState>, Path(id): Path<u64>) -> Json<Value> {
    let ok = state.dispatcher.accounts().remove(AccountId(id));
    Json(json!({ "ok": ok }))
}

/// POST /send - Dispatch to one recipient or a group.
async fn send(
    State(state): State<AppState>,
    Json(body): Json<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    let (request, mode) = body.into_request()?;
    let report = state.dispatcher.dispatch(request, mode).await?;

    let body = match report {
        Report::One(delivery) => json!({
            "ok": true,
            "log_id": delivery.attempt_id,
            "to": delivery.destination,
            "status": delivery.status,
            "auto_sent": delivery.delivered(),
        }),
        Report::Group(group) => json!({
            "ok": true,
            "sent": group.attempted,
            "auto_sent": group.hosted,
        }),
    };
    Ok(Json(body))
}

/// POST /send/web - Send through web automation directly.
async fn send_web(
    State(state): State<AppState>,
    Json(body): Json<WebSendRequest>,
) -> Result<Json<Value>, ApiError> {
    let delivery = state
        .dispatcher
        .send_via_web(body.phone, body.message)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "log_id": delivery.attempt_id,
        "status": delivery.status,
        "error": delivery.error,
    })))
}

/// GET /logs - Audit entries, newest first.
async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<DeliveryAttempt>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Json(state.dispatcher.recent_attempts(limit))
}

/// POST /recipients/{id}/forget - Clear the recipient from audit entries.
async fn forget_recipient(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let detached = state.dispatcher.forget_recipient(RecipientId(id))?;
    Ok(Json(json!({ "ok": true, "detached": detached })))
}

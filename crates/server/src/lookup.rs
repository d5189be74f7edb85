//! Lookup job endpoints.
//!
//! `POST /api/start-lookup` creates a session and starts its worker, then
//! returns at once. Clients poll `GET /api/status/{session_id}`; each poll
//! yields at most one progress message, and the terminal result is delivered
//! exactly once before the session disappears.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use loandesk_core::domain::lookup::{LookupOutcome, LookupRequest};
use loandesk_core::errors::{ApplicationError, InterfaceError};
use loandesk_core::runner::LookupRunner;
use loandesk_core::session::{PollOutcome, SessionId, SessionStore};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct LookupState {
    store: Arc<SessionStore>,
    runner: Arc<LookupRunner>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartLookupRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StartLookupResponse {
    pub success: bool,
    pub session_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: LookupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<LookupOutcome>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(store: Arc<SessionStore>, runner: Arc<LookupRunner>) -> Router {
    Router::new()
        .route("/api/start-lookup", post(start_lookup))
        .route("/api/status/{session_id}", get(lookup_status))
        .route("/api/lookup/{session_id}/cancel", post(cancel_lookup))
        .with_state(LookupState { store, runner })
}

pub async fn start_lookup(
    State(state): State<LookupState>,
    payload: Result<Json<StartLookupRequest>, JsonRejection>,
) -> ApiResult<StartLookupResponse> {
    let correlation_id = Uuid::new_v4().to_string();

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!(
                event_name = "http.lookup.rejected_body",
                correlation_id = %correlation_id,
                error = %rejection,
                "start-lookup body was not usable"
            );
            StartLookupRequest::default()
        }
    };

    let request = LookupRequest::new(&body.customer_id, &body.username, &body.password)
        .map_err(|error| api_error(ApplicationError::from(error), &correlation_id))?;
    let customer_id = request.customer_id.clone();

    let handle = state
        .store
        .allocate(request)
        .await
        .map_err(|error| api_error(ApplicationError::from(error), &correlation_id))?;
    let session_id = handle.session_id.clone();
    state.runner.spawn(handle);

    info!(
        event_name = "http.lookup.started",
        correlation_id = %correlation_id,
        session_id = %session_id,
        customer_id = %customer_id,
        "lookup session started"
    );

    Ok(Json(StartLookupResponse { success: true, session_id: session_id.to_string() }))
}

pub async fn lookup_status(
    State(state): State<LookupState>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusResponse> {
    let session_id = SessionId::from(session_id);
    let outcome = state.store.poll(&session_id).await.map_err(|error| {
        api_error(ApplicationError::from(error), &Uuid::new_v4().to_string())
    })?;

    let response = match outcome {
        PollOutcome::Processing(message) => StatusResponse {
            success: true,
            status: LookupStatus::Processing,
            message: Some(message),
            result: None,
        },
        PollOutcome::Completed(result) => StatusResponse {
            success: true,
            status: LookupStatus::Completed,
            message: None,
            result: Some(result),
        },
        PollOutcome::Failed(result) => StatusResponse {
            success: true,
            status: LookupStatus::Error,
            message: None,
            result: Some(result),
        },
    };
    Ok(Json(response))
}

pub async fn cancel_lookup(
    State(state): State<LookupState>,
    Path(session_id): Path<String>,
) -> Result<(StatusCode, Json<CancelResponse>), (StatusCode, Json<ApiError>)> {
    let session_id = SessionId::from(session_id);
    state.store.cancel(&session_id).await.map_err(|error| {
        api_error(ApplicationError::from(error), &Uuid::new_v4().to_string())
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse { success: true, session_id: session_id.to_string() }),
    ))
}

/// Periodically drops sessions nobody polled to completion.
pub fn spawn_reaper(
    store: Arc<SessionStore>,
    max_age: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let reaped = store.reap_expired(max_age).await;
                    if reaped > 0 {
                        info!(
                            event_name = "lookup.session.reaper_swept",
                            reaped,
                            "expired lookup sessions removed"
                        );
                    }
                }
            }
        }
    })
}

pub(crate) fn api_error(
    error: ApplicationError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(
        event_name = "http.request.failed",
        correlation_id = %interface.correlation_id(),
        status = status.as_u16(),
        error = %interface,
        "request failed"
    );
    (status, Json(ApiError { success: false, error: interface.user_message().to_string() }))
}

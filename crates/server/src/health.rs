use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use loandesk_core::runner::LookupRunner;
use loandesk_core::session::SessionStore;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    store: Arc<SessionStore>,
    runner: Arc<LookupRunner>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionCheck {
    pub status: &'static str,
    pub live: usize,
    pub limit: usize,
    pub idle_workers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub sessions: SessionCheck,
    pub checked_at: String,
}

pub fn router(store: Arc<SessionStore>, runner: Arc<LookupRunner>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store, runner })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    store: Arc<SessionStore>,
    runner: Arc<LookupRunner>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(store, runner)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let sessions = session_check(&state).await;
    let ready = sessions.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("lookup automation `{}` loaded", state.runner.automation_name()),
        },
        sessions,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn session_check(state: &HealthState) -> SessionCheck {
    let live = state.store.len().await;
    let limit = state.store.limit();
    SessionCheck {
        status: if live < limit { "ready" } else { "degraded" },
        live,
        limit,
        idle_workers: state.runner.available_workers(),
    }
}

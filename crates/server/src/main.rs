mod bootstrap;
mod health;
mod lookup;
mod templates;

use std::time::Duration;

use anyhow::Result;
use loandesk_core::config::{AppConfig, LoadOptions};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use loandesk_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // config first so logging honours its level and format
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let shutdown = CancellationToken::new();

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.store.clone(),
        app.runner.clone(),
    )
    .await?;

    let reaper = lookup::spawn_reaper(
        app.store.clone(),
        Duration::from_secs(app.config.lookup.session_ttl_secs),
        Duration::from_secs(app.config.lookup.reap_interval_secs),
        shutdown.clone(),
    );

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "loandesk-server started"
    );

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app.router())
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            server_shutdown.cancel();
        })
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        live_sessions = app.store.len().await,
        "loandesk-server stopping"
    );
    shutdown.cancel();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, reaper).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "session reaper did not stop within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

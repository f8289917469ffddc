use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use unified_tracker::config::Config;
use unified_tracker::tracker::{retention, UnifiedTracker};
use unified_tracker::{server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // ── 1. Load configuration ────────────────────────────────────
    let config = Config::from_env().context("configuration")?;

    // ── 2. Build shared state ────────────────────────────────────
    let tracker = Arc::new(UnifiedTracker::new(config.retention));
    let sweeper = retention::spawn_sweeper(tracker.clone(), config.sweep_interval);
    let state = Arc::new(AppState::new(tracker, config.clone()));

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        listen = %config.listen_addr,
        max_requests = config.retention.max_requests,
        max_age_secs = config.retention.max_age.as_secs(),
        api_key_required = !config.api_keys.is_empty(),
        "unified-tracker starting"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    sweeper.abort();
    tracing::info!("unified-tracker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

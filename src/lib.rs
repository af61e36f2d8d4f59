//! speedwatch -- on-demand network speed testing with role-gated history
//! and diagnostics.
//!
//! This crate provides the single-flight measurement runner, the bounded
//! in-memory history, health diagnostics, and the HTTP API serving them.

pub mod access;
pub mod analysis;
pub mod api;
pub mod config;
pub mod service;
pub mod storage;
pub mod throughput;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::service::SpeedService;
use crate::throughput::provider::HttpSpeedProvider;

/// Build the service with the HTTP speed test provider described by `config`.
pub fn build_service(config: &AppConfig) -> Result<SpeedService> {
    let provider = HttpSpeedProvider::new(&config.provider)?;
    Ok(SpeedService::new(Arc::new(provider)))
}

/// Start the speedwatch daemon and serve the API until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<()> {
    let service = build_service(&config)?;
    tracing::info!(
        history_capacity = storage::HISTORY_CAPACITY,
        servers = config.provider.servers.len(),
        "Speed test service initialized"
    );

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let app = api::router(api::state::AppState { service });

    tracing::info!(%addr, "speedwatch listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("speedwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

mod config;
mod errors;
mod models;
mod orchestration;
mod remote;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::orchestration::controller::{Controller, ControllerSettings};
use crate::orchestration::export::DirectorySaver;
use crate::remote::RemoteClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV studio v{}", env!("CARGO_PKG_VERSION"));

    // One HTTP client serves both collaborators
    let remote = RemoteClient::new(
        config.generate_url.clone(),
        config.compile_url.clone(),
        config.request_timeout,
    )?;
    info!(
        "Remote services: generate={} compile={}",
        config.generate_url, config.compile_url
    );

    let controller = Controller::new(
        Arc::new(remote.clone()),
        Arc::new(remote),
        ControllerSettings {
            debounce: config.compile_debounce,
            request_timeout: config.request_timeout,
        },
    );

    let exporter = config.export_dir.clone().map(|dir| {
        info!("Exports will be written to {}", dir.display());
        Arc::new(DirectorySaver::new(dir))
    });

    let state = AppState {
        controller: controller.clone(),
        config: config.clone(),
        exporter,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cancel any pending compile and release the live artifact
    controller.teardown();
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}

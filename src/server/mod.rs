//! HTTP surface of the prediction service.
//!
//! Exposes health, metadata, single-record and batch-file prediction
//! endpoints over the artifacts loaded at startup.

mod api;
mod error;
mod handlers;
mod state;
pub mod upload;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the server around an already-built state
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let config = state.config.server.clone();
    let start_time = state.started_at;

    if !state.artifacts.is_ready() {
        warn!("Serving without model artifacts, prediction endpoints will return 503");
    }

    let app = create_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        pid = std::process::id(),
        "Server listening and ready to accept connections"
    );

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

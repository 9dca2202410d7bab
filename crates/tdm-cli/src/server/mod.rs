//! HTTP boundary. Handlers call straight into the scheduler and return
//! without waiting on any transfer.

mod error;
mod routes;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tdm_core::scheduler::Scheduler;
use tdm_core::storage::ArtifactStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub store: ArtifactStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", post(routes::submit).delete(routes::cancel))
        .route("/api/status", get(routes::status))
        .route("/api/files/{filename}", get(routes::retrieve))
        .with_state(state)
}

/// Serves until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = listener.local_addr().context("listener address")?;
    tracing::info!("http listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("http server")
}

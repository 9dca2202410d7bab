//! `tdm serve` – scheduler loop, retention sweeper and HTTP API in one process.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tdm_core::config::TdmConfig;
use tdm_core::engine::WebSeedEngine;
use tdm_core::retention::{spawn_sweeper, RetentionSweeper};
use tdm_core::scheduler::{Scheduler, SchedulerHandle};
use tdm_core::storage::ArtifactStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::server::{self, AppState};

pub async fn run_serve(cfg: &TdmConfig, bind: Option<String>, dir: Option<PathBuf>) -> Result<()> {
    let dir = match dir {
        Some(d) => d,
        None => cfg.download_dir()?,
    };
    let store = ArtifactStore::open(&dir)?;
    let bind = bind.unwrap_or_else(|| cfg.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {}", bind))?;

    let engine = Arc::new(WebSeedEngine::new(cfg.engine_options()));
    let (scheduler, events) = Scheduler::new(cfg.max_concurrent, engine, store.root());
    let loop_handle = SchedulerHandle::spawn(scheduler.clone(), events, cfg.tick_interval());

    let shutdown = CancellationToken::new();
    let sweeper = RetentionSweeper::new(store.clone(), Some(scheduler.clone()), cfg.retention());
    let sweeper_handle = spawn_sweeper(sweeper, cfg.sweep_interval(), shutdown.child_token());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                signal_token.cancel();
            }
            Err(e) => tracing::warn!("cannot listen for ctrl-c: {}", e),
        }
    });

    println!(
        "tdm serving on http://{} (artifacts in {}, max {} concurrent)",
        bind,
        dir.display(),
        scheduler.max_concurrent()
    );

    let state = AppState { scheduler, store };
    let served = server::serve(listener, state, shutdown.clone()).await;

    shutdown.cancel();
    loop_handle.shutdown().await;
    if let Err(e) = sweeper_handle.await {
        tracing::warn!("sweeper task ended abnormally: {}", e);
    }
    served
}

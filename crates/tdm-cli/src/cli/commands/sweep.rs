//! `tdm sweep` – one retention pass, for external cron-style triggers.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tdm_core::config::TdmConfig;
use tdm_core::retention::RetentionSweeper;
use tdm_core::storage::ArtifactStore;

pub async fn run_sweep(cfg: &TdmConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = match dir {
        Some(d) => d,
        None => cfg.download_dir()?,
    };
    let store = ArtifactStore::open(&dir)?;
    let sweeper = RetentionSweeper::new(store, None, cfg.retention());
    let report = tokio::task::spawn_blocking(move || sweeper.sweep())
        .await
        .context("sweep task")?;
    println!(
        "swept {}: {} file(s) removed, {} error(s)",
        dir.display(),
        report.removed_files,
        report.errors
    );
    Ok(())
}

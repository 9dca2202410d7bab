//! Single-stream HTTP GET of a web seed into a `.part` file.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::ProgressStats;
use crate::storage::StorageWriter;

use super::EngineOptions;

/// Minimum spacing between progress reports.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Returned when the transfer stopped because its handle was cancelled.
#[derive(Debug, thiserror::Error)]
#[error("transfer cancelled")]
pub struct TransferAborted;

/// Downloads `url` with a single GET, writing sequentially to `temp_path`.
///
/// `on_progress` is called from the curl write callback at most every
/// `PROGRESS_INTERVAL`. Setting `abort` stops the transfer at the next chunk
/// and the function returns `TransferAborted`. Returns the bytes written.
pub fn fetch_to_file(
    url: &str,
    temp_path: &Path,
    expected_len: Option<u64>,
    opts: &EngineOptions,
    abort: &Arc<AtomicBool>,
    mut on_progress: impl FnMut(ProgressStats),
) -> Result<u64> {
    let storage = StorageWriter::create(temp_path)?;
    let offset = Arc::new(AtomicU64::new(0));
    let offset_cb = Arc::clone(&offset);
    let abort_cb = Arc::clone(abort);
    let writer = storage.clone();
    let started = Instant::now();
    let mut last_report: Option<Instant> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    if let Some(speed) = opts.max_recv_speed {
        easy.max_recv_speed(speed)?;
    }
    easy.connect_timeout(Duration::from_secs(opts.connect_timeout_secs))?;
    easy.low_speed_limit(opts.low_speed_limit)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.fail_on_error(true)?;

    let perform = {
        let mut transfer = easy.transfer();
        transfer.write_function(move |data| {
            if abort_cb.load(Ordering::Relaxed) {
                return Ok(0);
            }
            let off = offset_cb.fetch_add(data.len() as u64, Ordering::Relaxed);
            if let Err(e) = writer.write_at(off, data) {
                tracing::warn!("web seed write failed: {:#}", e);
                return Ok(0);
            }
            let now = Instant::now();
            if last_report.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL) {
                last_report = Some(now);
                on_progress(ProgressStats {
                    bytes_done: off + data.len() as u64,
                    total_bytes: expected_len,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                });
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if abort.load(Ordering::Relaxed) {
        return Err(TransferAborted.into());
    }
    perform.with_context(|| format!("GET {} failed", url))?;

    let written = offset.load(Ordering::Relaxed);
    if let Some(exp) = expected_len {
        if written != exp {
            anyhow::bail!("partial transfer: wrote {} of {}", written, exp);
        }
    }
    storage.sync()?;
    Ok(written)
}

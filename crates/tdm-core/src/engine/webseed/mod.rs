//! Web-seed transfer engine.
//!
//! Resolves a magnet link to an HTTP(S) source named in its `ws`/`as`/`xs`
//! parameters and fetches the payload with libcurl on a dedicated thread.
//! Magnets without such a source are rejected at start. Concurrent transfers
//! that resolve to the same artifact name get distinct names.

mod magnet;
mod probe;
mod transfer;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::EngineStartError;
use crate::storage::{self, NameReservations};
use crate::url_model;

use super::{EventSink, StartRequest, TransferEngine, TransferHandle};

pub use magnet::{parse_magnet, Magnet};
pub use probe::HeadResult;
pub use transfer::TransferAborted;

/// libcurl knobs for web-seed transfers (optional `[engine]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Abort if throughput stays below this many bytes/sec for 60s.
    pub low_speed_limit: u32,
    /// Optional receive cap in bytes per second.
    #[serde(default)]
    pub max_recv_speed: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            max_recv_speed: None,
        }
    }
}

/// Engine that downloads magnet payloads from their web seeds.
#[derive(Debug, Clone, Default)]
pub struct WebSeedEngine {
    opts: EngineOptions,
    names: NameReservations,
}

impl WebSeedEngine {
    pub fn new(opts: EngineOptions) -> Self {
        Self {
            opts,
            names: NameReservations::default(),
        }
    }
}

/// Cancellation flag for one web-seed transfer thread.
#[derive(Debug)]
struct WebSeedHandle {
    abort: Arc<AtomicBool>,
}

impl TransferHandle for WebSeedHandle {
    fn cancel(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }
}

impl TransferEngine for WebSeedEngine {
    fn start(
        &self,
        request: StartRequest,
        events: EventSink,
    ) -> Result<Box<dyn TransferHandle>, EngineStartError> {
        let magnet = parse_magnet(&request.locator)?;
        if magnet.sources.is_empty() {
            return Err(EngineStartError::Rejected(format!(
                "magnet {} has no HTTP web seed",
                magnet.info_hash
            )));
        }

        let abort = Arc::new(AtomicBool::new(false));
        let job = TransferJob {
            magnet,
            destination: request.destination,
            opts: self.opts.clone(),
            names: self.names.clone(),
            abort: Arc::clone(&abort),
            events,
        };
        thread::Builder::new()
            .name(format!("tdm-webseed-{}", request.task_id))
            .spawn(move || job.run())
            .map_err(|e| EngineStartError::Unavailable(format!("spawn transfer thread: {}", e)))?;

        Ok(Box::new(WebSeedHandle { abort }))
    }
}

struct TransferJob {
    magnet: Magnet,
    destination: PathBuf,
    opts: EngineOptions,
    names: NameReservations,
    abort: Arc<AtomicBool>,
    events: EventSink,
}

impl TransferJob {
    /// Tries each source in link order; the first one that completes wins.
    fn run(self) {
        let task_id = self.events.task_id();
        let mut last_err = None;

        for source in &self.magnet.sources {
            if self.abort.load(Ordering::Relaxed) {
                return;
            }
            match self.fetch_source(source) {
                Ok((name, size)) => {
                    tracing::info!(task_id, %source, size, "web seed transfer completed: {}", name);
                    self.events.completed(name, size);
                    return;
                }
                Err(e) if e.downcast_ref::<TransferAborted>().is_some() => {
                    tracing::debug!(task_id, "web seed transfer cancelled");
                    return;
                }
                Err(e) => {
                    tracing::warn!(task_id, %source, "web seed failed: {:#}", e);
                    last_err = Some(e);
                }
            }
        }

        let reason = last_err
            .map(|e| format!("{:#}", e))
            .unwrap_or_else(|| "no usable web seed".to_string());
        self.events.failed(reason);
    }

    /// Fetches one source into the destination. Returns the artifact name and
    /// its final size.
    fn fetch_source(&self, source: &str) -> anyhow::Result<(String, u64)> {
        let head = probe::probe(source, &self.opts).unwrap_or_else(|e| {
            tracing::debug!(%source, "HEAD probe failed, continuing without size: {:#}", e);
            HeadResult::default()
        });
        let wanted = artifact_name(&self.magnet, source, head.content_disposition.as_deref());
        // Held until the rename below has put the file in place.
        let reserved = self.names.reserve(&self.destination, &wanted);
        let name = reserved.name().to_string();
        if name != wanted {
            tracing::info!(task_id = self.events.task_id(), %wanted, %name, "artifact name taken, renamed");
        }
        self.events.ready(&name, head.content_length);

        let final_path = self.destination.join(&name);
        let temp_path = storage::temp_path(&final_path, self.events.task_id());
        let result = transfer::fetch_to_file(
            source,
            &temp_path,
            head.content_length,
            &self.opts,
            &self.abort,
            |stats| self.events.progress(&stats),
        )
        .and_then(|written| {
            if self.abort.load(Ordering::Relaxed) {
                return Err(TransferAborted.into());
            }
            storage::finalize(&temp_path, &final_path)?;
            Ok(written)
        });

        if result.is_err() {
            remove_partial(&temp_path);
        }
        drop(reserved);
        result.map(|size| (name, size))
    }
}

/// Artifact name: the magnet's `dn` when present, otherwise derived from the
/// source response / URL. Always a single sanitized path component.
pub fn artifact_name(magnet: &Magnet, source: &str, content_disposition: Option<&str>) -> String {
    magnet
        .display_name
        .as_deref()
        .map(url_model::sanitize_filename_for_linux)
        .filter(|n| !n.is_empty() && n != "." && n != "..")
        .unwrap_or_else(|| url_model::derive_filename(source, content_disposition))
}

fn remove_partial(temp_path: &Path) {
    if let Err(e) = std::fs::remove_file(temp_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %temp_path.display(), "could not remove partial file: {}", e);
        }
    }
}

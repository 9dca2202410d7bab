//! Transfer engine adapter boundary.
//!
//! The scheduler drives an engine through `TransferEngine::start` and observes
//! it through typed `EngineEvent`s. Engines never touch the task table: they
//! post events into a channel and the scheduler's coordinating task applies
//! them, so every record has a single writer.

mod progress;
pub mod webseed;

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::EngineStartError;
use crate::task::TaskId;

pub use progress::ProgressStats;
pub use webseed::WebSeedEngine;

/// What the scheduler hands to an engine when promoting a task.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub task_id: TaskId,
    pub locator: String,
    /// Flat artifact directory the engine writes the finished file into.
    pub destination: PathBuf,
}

/// Live engine-side transfer session, owned by the task record while active.
pub trait TransferHandle: Send + Sync {
    /// Best-effort stop and release of engine resources. Idempotent; must not
    /// panic if the transfer already finished.
    fn cancel(&self);
}

/// The external content-transfer capability.
pub trait TransferEngine: Send + Sync {
    /// Begin transferring `request.locator`. Must return promptly: the actual
    /// transfer runs elsewhere and reports through `events`.
    fn start(
        &self,
        request: StartRequest,
        events: EventSink,
    ) -> Result<Box<dyn TransferHandle>, EngineStartError>;
}

/// Engine notification for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub task_id: TaskId,
    pub kind: EngineEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// Name and size resolved.
    Ready { name: String, size: Option<u64> },
    /// Bytes transferred so far, with optional engine-computed rate and ETA.
    Progress {
        bytes_done: u64,
        bytes_per_sec: Option<f64>,
        eta_secs: Option<f64>,
    },
    /// Artifact `name` is complete in the destination directory and holds
    /// `size` bytes.
    Completed { name: String, size: u64 },
    /// Transfer failed mid-way.
    Failed { reason: String },
}

/// Per-task sender engines use to report events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    task_id: TaskId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn new(task_id: TaskId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { task_id, tx }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    fn send(&self, kind: EngineEventKind) {
        // Receiver gone means the scheduler shut down; nothing left to notify.
        let _ = self.tx.send(EngineEvent {
            task_id: self.task_id,
            kind,
        });
    }

    pub fn ready(&self, name: impl Into<String>, size: Option<u64>) {
        self.send(EngineEventKind::Ready {
            name: name.into(),
            size,
        });
    }

    pub fn progress(&self, stats: &ProgressStats) {
        self.send(EngineEventKind::Progress {
            bytes_done: stats.bytes_done,
            bytes_per_sec: Some(stats.bytes_per_sec()),
            eta_secs: stats.eta_secs(),
        });
    }

    pub fn completed(&self, name: impl Into<String>, size: u64) {
        self.send(EngineEventKind::Completed {
            name: name.into(),
            size,
        });
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.send(EngineEventKind::Failed {
            reason: reason.into(),
        });
    }
}

//! Scheduler: admission, promotion under the concurrency cap, engine event
//! application and cancellation.
//!
//! All task state lives in one `TaskTable` behind a single `RwLock`. Every
//! mutation takes the write lock for a short, non-blocking critical section;
//! snapshots take the read lock. Engine calls never happen under the lock. Engines never touch the table directly: they
//! post `EngineEvent`s that the coordinating task (`service`) feeds back
//! through `apply_event`, so each record has one writer.

mod queue;
mod service;
mod table;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tokio::sync::mpsc;

use crate::engine::{
    EngineEvent, EngineEventKind, EventSink, StartRequest, TransferEngine, TransferHandle,
};
use crate::error::{EngineStartError, TdmError};
use crate::locator;
use crate::status::{StatusCounts, TaskView};
use crate::storage;
use crate::task::{TaskId, TaskRecord, TaskStatus, Telemetry};
use crate::url_model;

pub use queue::AdmissionQueue;
pub use service::SchedulerHandle;

use table::TaskTable;

/// Receiving end of the engine event channel. Owned by the coordinating task.
pub type EngineEvents = mpsc::UnboundedReceiver<EngineEvent>;

/// Shared scheduler state. Cloning yields another reference to the same table.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    table: RwLock<TaskTable>,
    engine: Arc<dyn TransferEngine>,
    destination: PathBuf,
    max_concurrent: usize,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
}

impl Scheduler {
    /// Builds a scheduler and the event receiver its coordinating task must drain.
    /// A cap of zero is raised to one.
    pub fn new(
        max_concurrent: usize,
        engine: Arc<dyn TransferEngine>,
        destination: impl Into<PathBuf>,
    ) -> (Self, EngineEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Inner {
            table: RwLock::new(TaskTable::default()),
            engine,
            destination: destination.into(),
            max_concurrent: max_concurrent.max(1),
            events_tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        )
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    pub fn destination(&self) -> &Path {
        &self.inner.destination
    }

    /// Validates `locator` and appends a new queued task. Nothing is recorded
    /// when validation fails.
    pub fn submit(&self, locator: &str) -> Result<TaskId, TdmError> {
        let locator = locator::validate(locator)?;
        let mut table = self.inner.table.write().unwrap();
        let id = table.allocate_id();
        table
            .records
            .insert(id, TaskRecord::new(id, locator, SystemTime::now()));
        table.queue.enqueue(id);
        tracing::info!(task_id = id, queued = table.queue.len(), "task queued");
        Ok(id)
    }

    /// Removes task `id`. A queued task leaves the backlog without the engine
    /// ever seeing it; an active task frees its slot and its engine session is
    /// cancelled best-effort after the lock is released. Returns false for an
    /// unknown id.
    pub fn cancel(&self, id: TaskId) -> bool {
        let handle = {
            let mut table = self.inner.table.write().unwrap();
            let Some(mut record) = table.records.remove(&id) else {
                tracing::debug!(task_id = id, "cancel for unknown task");
                return false;
            };
            match record.status() {
                TaskStatus::Queued => {
                    table.queue.remove(id);
                    None
                }
                TaskStatus::Active => {
                    table.release_slot();
                    record.take_handle()
                }
                TaskStatus::Completed | TaskStatus::Failed => None,
            }
        };
        tracing::info!(task_id = id, "task cancelled");
        if let Some(handle) = handle {
            handle.cancel();
        }
        true
    }

    /// Promotes queued tasks while slots are free. Returns how many started.
    ///
    /// A task whose engine start fails goes straight to `failed` and does not
    /// consume a slot, so the next queued task is tried in the same pass.
    /// `TransferEngine::start` runs with the table unlocked.
    pub fn tick(&self) -> usize {
        let mut started = 0;
        while let Some(request) = self.claim_next() {
            let id = request.task_id;
            let sink = EventSink::new(id, self.inner.events_tx.clone());
            let outcome = self.inner.engine.start(request, sink);
            if self.settle_start(id, outcome) {
                started += 1;
            }
        }
        if started > 0 {
            tracing::debug!(started, "tick");
        }
        started
    }

    /// Dequeues the next task and holds a slot for it while its start runs.
    fn claim_next(&self) -> Option<StartRequest> {
        let mut guard = self.inner.table.write().unwrap();
        let table = &mut *guard;
        while table.has_free_slot(self.inner.max_concurrent) {
            let id = table.queue.dequeue_next()?;
            let Some(record) = table.records.get(&id) else {
                continue;
            };
            table.starting += 1;
            return Some(StartRequest {
                task_id: id,
                locator: record.locator().to_string(),
                destination: self.inner.destination.clone(),
            });
        }
        None
    }

    /// Records the engine's answer for a claimed task. A task cancelled while
    /// its start was in flight gets its fresh session cancelled. Returns true
    /// when the task became active.
    fn settle_start(
        &self,
        id: TaskId,
        outcome: Result<Box<dyn TransferHandle>, EngineStartError>,
    ) -> bool {
        let orphan = {
            let mut guard = self.inner.table.write().unwrap();
            let table = &mut *guard;
            table.starting -= 1;
            match (table.records.get_mut(&id), outcome) {
                (Some(record), Ok(handle)) => {
                    record.activate(handle);
                    table.active += 1;
                    tracing::info!(task_id = id, active = table.active, "task started");
                    return true;
                }
                (Some(record), Err(e)) => {
                    tracing::warn!(task_id = id, "engine refused to start: {}", e);
                    record.fail_to_start(e.to_string());
                    return false;
                }
                (None, Ok(handle)) => handle,
                (None, Err(e)) => {
                    tracing::debug!(task_id = id, "start failed for cancelled task: {}", e);
                    return false;
                }
            }
        };
        tracing::info!(task_id = id, "task cancelled while starting");
        orphan.cancel();
        false
    }

    /// Applies one engine notification. Events for unknown or non-active tasks
    /// (late callbacks after cancel or sweep) change nothing. Returns true when
    /// the event freed a slot.
    pub fn apply_event(&self, event: EngineEvent) -> bool {
        let EngineEvent { task_id, kind } = event;

        let released: Option<Box<dyn TransferHandle>> = {
            let mut table = self.inner.table.write().unwrap();
            let Some(record) = table.records.get_mut(&task_id) else {
                tracing::debug!(task_id, ?kind, "event for unknown task ignored");
                return false;
            };
            if record.status() != TaskStatus::Active {
                tracing::debug!(task_id, status = %record.status(), "event for inactive task ignored");
                return false;
            }
            let released = match kind {
                EngineEventKind::Ready { name, size } => {
                    tracing::info!(task_id, %name, ?size, "artifact resolved");
                    record.set_artifact(name, size);
                    None
                }
                EngineEventKind::Progress {
                    bytes_done,
                    bytes_per_sec,
                    eta_secs,
                } => {
                    record.record_progress(bytes_done, Telemetry::normalized(bytes_per_sec, eta_secs));
                    None
                }
                EngineEventKind::Completed { name, size } => {
                    record.set_artifact(name.clone(), Some(size));
                    let location = url_model::artifact_location(&name);
                    tracing::info!(task_id, %name, "task completed");
                    record.complete(name, location)
                }
                EngineEventKind::Failed { reason } => {
                    let err = TdmError::EngineRuntime(reason);
                    tracing::warn!(task_id, "{}", err);
                    record.fail(err.to_string())
                }
            };
            if released.is_some() {
                table.release_slot();
            }
            released
        };

        match released {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Applies every event already waiting in `events`, then promotes. Used
    /// where no coordinating task runs (tests, one-shot tools).
    pub fn pump(&self, events: &mut EngineEvents) -> usize {
        while let Ok(event) = events.try_recv() {
            self.apply_event(event);
        }
        self.tick()
    }

    /// Point-in-time view of every task, in creation order.
    pub fn snapshot(&self) -> Vec<TaskView> {
        let table = self.inner.table.read().unwrap();
        table.records.values().map(TaskView::project).collect()
    }

    pub fn get(&self, id: TaskId) -> Option<TaskView> {
        let table = self.inner.table.read().unwrap();
        table.records.get(&id).map(TaskView::project)
    }

    pub fn counts(&self) -> StatusCounts {
        let table = self.inner.table.read().unwrap();
        let mut counts = StatusCounts::default();
        for record in table.records.values() {
            counts.add(record.status());
        }
        counts
    }

    pub fn active_count(&self) -> usize {
        self.inner.table.read().unwrap().active
    }

    /// Deletes terminal records whose artifact is `name`. Returns how many.
    pub fn remove_terminal_by_artifact(&self, name: &str) -> usize {
        let mut table = self.inner.table.write().unwrap();
        let before = table.records.len();
        table
            .records
            .retain(|_, r| !(r.status().is_terminal() && r.artifact_name() == Some(name)));
        before - table.records.len()
    }

    /// Deletes failed records created before `cutoff`. Returns how many.
    pub fn prune_failed_before(&self, cutoff: SystemTime) -> usize {
        let mut table = self.inner.table.write().unwrap();
        let before = table.records.len();
        table
            .records
            .retain(|_, r| !(r.status() == TaskStatus::Failed && r.created_at() < cutoff));
        before - table.records.len()
    }

    /// File names active transfers are writing to (final and their own
    /// `.part`).
    pub fn artifacts_in_use(&self) -> HashSet<String> {
        let table = self.inner.table.read().unwrap();
        let mut names = HashSet::new();
        for record in table.records.values() {
            if record.status() != TaskStatus::Active {
                continue;
            }
            if let Some(name) = record.artifact_name() {
                names.insert(storage::temp_name(name, record.id()));
                names.insert(name.to_string());
            }
        }
        names
    }

    /// Fails every active task and cancels its engine session.
    pub fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut guard = self.inner.table.write().unwrap();
            let table = &mut *guard;
            let handles: Vec<_> = table
                .records
                .values_mut()
                .filter_map(|r| r.fail("scheduler shut down"))
                .collect();
            table.active -= handles.len();
            handles
        };
        if !handles.is_empty() {
            tracing::info!(count = handles.len(), "cancelling active transfers");
        }
        for handle in handles {
            handle.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        self.inner
            .table
            .read()
            .unwrap()
            .check_invariants(self.inner.max_concurrent);
    }
}

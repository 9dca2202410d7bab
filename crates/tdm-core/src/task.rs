//! Task record: the unit of scheduled work and its forward-only state machine.
//!
//! ```text
//! queued --start ok--> active --engine success--> completed
//! queued --start err-> failed     active --engine failure--> failed
//! queued|active --cancel--> [removed]
//! ```

use std::time::SystemTime;

use serde::Serialize;

use crate::engine::TransferHandle;

/// Task identifier. Allocated from a process-wide counter; never reused.
pub type TaskId = u64;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// True if `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Active)
                | (TaskStatus::Queued, TaskStatus::Failed)
                | (TaskStatus::Active, TaskStatus::Completed)
                | (TaskStatus::Active, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-reported transfer rate and time remaining. Only kept while active.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub bytes_per_sec: Option<f64>,
    pub eta_secs: Option<f64>,
}

impl Telemetry {
    /// Drops negative, NaN and infinite readings so consumers see "unknown"
    /// instead of a nonsensical number.
    pub fn normalized(bytes_per_sec: Option<f64>, eta_secs: Option<f64>) -> Self {
        let clean = |v: Option<f64>| v.filter(|x| x.is_finite() && *x >= 0.0);
        Self {
            bytes_per_sec: clean(bytes_per_sec),
            eta_secs: clean(eta_secs),
        }
    }
}

/// One submitted locator and everything known about its transfer.
pub struct TaskRecord {
    id: TaskId,
    locator: String,
    status: TaskStatus,
    progress: u8,
    artifact_name: Option<String>,
    artifact_size: Option<u64>,
    artifact_location: Option<String>,
    created_at: SystemTime,
    failure: Option<String>,
    telemetry: Option<Telemetry>,
    handle: Option<Box<dyn TransferHandle>>,
}

impl TaskRecord {
    pub fn new(id: TaskId, locator: impl Into<String>, created_at: SystemTime) -> Self {
        Self {
            id,
            locator: locator.into(),
            status: TaskStatus::Queued,
            progress: 0,
            artifact_name: None,
            artifact_size: None,
            artifact_location: None,
            created_at,
            failure: None,
            telemetry: None,
            handle: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn artifact_name(&self) -> Option<&str> {
        self.artifact_name.as_deref()
    }

    pub fn artifact_size(&self) -> Option<u64> {
        self.artifact_size
    }

    pub fn artifact_location(&self) -> Option<&str> {
        self.artifact_location.as_deref()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn telemetry(&self) -> Option<Telemetry> {
        self.telemetry
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// queued -> active. The record takes ownership of the engine session.
    pub fn activate(&mut self, handle: Box<dyn TransferHandle>) -> bool {
        if !self.status.can_transition_to(TaskStatus::Active) {
            return false;
        }
        self.status = TaskStatus::Active;
        self.handle = Some(handle);
        true
    }

    /// queued -> failed, when the engine refused to start.
    pub fn fail_to_start(&mut self, reason: impl Into<String>) -> bool {
        if self.status != TaskStatus::Queued {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.failure = Some(reason.into());
        true
    }

    /// Engine resolved name and size. Ignored unless active.
    pub fn set_artifact(&mut self, name: String, size: Option<u64>) -> bool {
        if self.status != TaskStatus::Active {
            return false;
        }
        self.artifact_name = Some(name);
        self.artifact_size = size;
        true
    }

    /// Recomputes the percentage from `bytes_done` against the known size.
    ///
    /// Progress never goes backwards and stays below 100 until completion.
    pub fn record_progress(&mut self, bytes_done: u64, telemetry: Telemetry) -> bool {
        if self.status != TaskStatus::Active {
            return false;
        }
        self.telemetry = Some(telemetry);
        if let Some(total) = self.artifact_size.filter(|t| *t > 0) {
            let pct = ((bytes_done as f64 / total as f64) * 100.0).round();
            let pct = pct.clamp(0.0, 99.0) as u8;
            self.progress = self.progress.max(pct);
        }
        true
    }

    /// active -> completed. Returns the released engine handle, or `None` if
    /// the task was not active (nothing changes in that case).
    pub fn complete(&mut self, name: String, location: String) -> Option<Box<dyn TransferHandle>> {
        if self.status != TaskStatus::Active {
            return None;
        }
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.artifact_name = Some(name);
        self.artifact_location = Some(location);
        self.telemetry = None;
        self.handle.take()
    }

    /// active -> failed. Same contract as `complete`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Option<Box<dyn TransferHandle>> {
        if self.status != TaskStatus::Active {
            return None;
        }
        self.status = TaskStatus::Failed;
        self.failure = Some(reason.into());
        self.telemetry = None;
        self.handle.take()
    }

    /// Detaches the engine session (cancellation path).
    pub fn take_handle(&mut self) -> Option<Box<dyn TransferHandle>> {
        self.handle.take()
    }
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("locator", &self.locator)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("artifact_name", &self.artifact_name)
            .field("artifact_size", &self.artifact_size)
            .field("has_handle", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandle(Arc<AtomicUsize>);

    impl TransferHandle for CountingHandle {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn active_record() -> TaskRecord {
        let mut r = TaskRecord::new(1, "magnet:?xt=urn:btih:AAA", SystemTime::now());
        assert!(r.activate(Box::new(CountingHandle(Arc::new(AtomicUsize::new(0))))));
        r
    }

    #[test]
    fn transitions_follow_state_machine() {
        use TaskStatus::*;
        assert!(Queued.can_transition_to(Active));
        assert!(Queued.can_transition_to(Failed));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Failed));
        assert!(!Queued.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Active.can_transition_to(Queued));
    }

    #[test]
    fn progress_is_monotonic_and_capped_until_complete() {
        let mut r = active_record();
        r.set_artifact("movie.mkv".into(), Some(1000));
        r.record_progress(500, Telemetry::default());
        assert_eq!(r.progress(), 50);
        r.record_progress(100, Telemetry::default());
        assert_eq!(r.progress(), 50);
        r.record_progress(1000, Telemetry::default());
        assert_eq!(r.progress(), 99);
        r.complete("movie.mkv".into(), "/api/files/movie.mkv".into())
            .expect("active task completes");
        assert_eq!(r.progress(), 100);
        assert_eq!(r.status(), TaskStatus::Completed);
        assert!(!r.has_handle());
        assert!(r.telemetry().is_none());
    }

    #[test]
    fn progress_without_size_keeps_zero() {
        let mut r = active_record();
        assert!(r.record_progress(4096, Telemetry::default()));
        assert_eq!(r.progress(), 0);
    }

    #[test]
    fn terminal_records_do_not_resurrect() {
        let mut r = active_record();
        assert!(r.fail("tracker error").is_some());
        assert!(r.complete("x".into(), "/api/files/x".into()).is_none());
        assert!(!r.set_artifact("x".into(), Some(1)));
        assert!(!r.record_progress(1, Telemetry::default()));
        assert_eq!(r.status(), TaskStatus::Failed);
        assert_eq!(r.failure(), Some("tracker error"));
    }

    #[test]
    fn fail_to_start_only_from_queued() {
        let mut r = TaskRecord::new(7, "magnet:?", SystemTime::now());
        assert!(r.fail_to_start("no web seed"));
        assert_eq!(r.status(), TaskStatus::Failed);
        assert!(!r.fail_to_start("again"));
        let mut a = active_record();
        assert!(!a.fail_to_start("nope"));
        assert_eq!(a.status(), TaskStatus::Active);
    }

    #[test]
    fn telemetry_normalizes_bad_eta() {
        let t = Telemetry::normalized(Some(1024.0), Some(f64::INFINITY));
        assert_eq!(t.bytes_per_sec, Some(1024.0));
        assert_eq!(t.eta_secs, None);
        let t = Telemetry::normalized(Some(-1.0), Some(-5.0));
        assert_eq!(t, Telemetry::default());
        let t = Telemetry::normalized(None, Some(f64::NAN));
        assert_eq!(t.eta_secs, None);
    }
}

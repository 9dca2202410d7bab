//! Retention sweeper: deletes artifacts older than the retention window and
//! the terminal task records that pointed at them.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::scheduler::Scheduler;
use crate::storage::ArtifactStore;

/// Default retention window: 24 hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed_files: usize,
    pub removed_tasks: usize,
    pub errors: usize,
}

pub struct RetentionSweeper {
    store: ArtifactStore,
    scheduler: Option<Scheduler>,
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(store: ArtifactStore, scheduler: Option<Scheduler>, retention: Duration) -> Self {
        Self {
            store,
            scheduler,
            retention,
        }
    }

    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// One pass with `now` as the reference time. Never aborts on a single
    /// artifact's failure; running it twice in a row is a no-op the second time.
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        let cutoff = now.checked_sub(self.retention).unwrap_or(SystemTime::UNIX_EPOCH);
        let in_use = self
            .scheduler
            .as_ref()
            .map(Scheduler::artifacts_in_use)
            .unwrap_or_default();

        let entries = match self.store.entries() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("sweep could not list artifacts: {}", e);
                report.errors += 1;
                return report;
            }
        };

        for entry in entries {
            if entry.modified >= cutoff || in_use.contains(&entry.name) {
                continue;
            }
            if let Err(e) = self.store.remove(&entry.name) {
                tracing::warn!(name = %entry.name, "sweep delete failed: {}", e);
                report.errors += 1;
                continue;
            }
            report.removed_files += 1;
            tracing::info!(name = %entry.name, size = entry.size, "expired artifact deleted");
            if let Some(scheduler) = &self.scheduler {
                report.removed_tasks += scheduler.remove_terminal_by_artifact(&entry.name);
            }
        }

        if let Some(scheduler) = &self.scheduler {
            report.removed_tasks += scheduler.prune_failed_before(cutoff);
        }

        tracing::debug!(?report, "sweep finished");
        report
    }
}

/// Runs `sweeper` every `interval` on the blocking pool until `cancel` fires.
/// The first pass runs immediately.
pub fn spawn_sweeper(
    sweeper: RetentionSweeper,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let sweeper = std::sync::Arc::new(sweeper);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let sweeper = std::sync::Arc::clone(&sweeper);
                    match tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                        Ok(report) if report != SweepReport::default() => {
                            tracing::info!(
                                removed_files = report.removed_files,
                                removed_tasks = report.removed_tasks,
                                errors = report.errors,
                                "retention sweep"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("retention sweep panicked: {}", e),
                    }
                }
            }
        }
    })
}

//! Coordinating task: the single writer that ticks the scheduler and applies
//! engine events.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{EngineEvents, Scheduler};

/// Running coordinating task. Dropping the handle does not stop it; call
/// `shutdown`.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Spawns the loop on the current tokio runtime. It promotes queued tasks
    /// every `tick_interval` and immediately after any event that frees a slot.
    pub fn spawn(scheduler: Scheduler, mut events: EngineEvents, tick_interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(?tick_interval, "scheduler loop started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        scheduler.tick();
                    }
                    event = events.recv() => match event {
                        Some(event) => {
                            if scheduler.apply_event(event) {
                                scheduler.tick();
                            }
                        }
                        // Unreachable while the scheduler holds its sender.
                        None => break,
                    },
                }
            }
            scheduler.shutdown();
            let counts = scheduler.counts();
            tracing::info!(?counts, "scheduler loop stopped");
        });
        Self { cancel, join }
    }

    /// Token that stops the loop when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the loop, cancels active transfers and waits for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!("scheduler loop ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedEngine;
    use super::*;
    use crate::task::TaskStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn loop_promotes_and_applies_events() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(ScriptedEngine::default());
        let (sched, rx) = Scheduler::new(1, engine.clone(), dir.path());
        let handle = SchedulerHandle::spawn(sched.clone(), rx, Duration::from_millis(20));

        let a = sched.submit("magnet:?xt=urn:btih:AAA").unwrap();
        let b = sched.submit("magnet:?xt=urn:btih:BBB").unwrap();

        wait_for(|| sched.get(a).map(|v| v.status) == Some(TaskStatus::Active)).await;
        assert_eq!(sched.get(b).unwrap().status, TaskStatus::Queued);

        engine.sink(a).completed("a.bin", 1);
        wait_for(|| sched.get(b).map(|v| v.status) == Some(TaskStatus::Active)).await;
        assert_eq!(sched.get(a).unwrap().status, TaskStatus::Completed);

        handle.shutdown().await;
        assert_eq!(sched.get(b).unwrap().status, TaskStatus::Failed);
        assert_eq!(sched.active_count(), 0);
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }
}

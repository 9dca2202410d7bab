//! The task table: every record, the backlog and the active counter, mutated
//! together under one lock.

use std::collections::BTreeMap;

use crate::task::{TaskId, TaskRecord};

use super::queue::AdmissionQueue;

#[derive(Debug, Default)]
pub(crate) struct TaskTable {
    /// Keyed by id; ids grow with submission so iteration is creation order.
    pub(crate) records: BTreeMap<TaskId, TaskRecord>,
    pub(crate) queue: AdmissionQueue,
    pub(crate) active: usize,
    /// Slots held by tasks whose engine start is in flight outside the lock.
    pub(crate) starting: usize,
    next_id: TaskId,
}

impl TaskTable {
    pub(crate) fn allocate_id(&mut self) -> TaskId {
        self.next_id += 1;
        self.next_id
    }

    /// Called whenever a record leaves `Active`. Saturates so a bookkeeping
    /// slip can never wrap the counter.
    pub(crate) fn release_slot(&mut self) {
        debug_assert!(self.active > 0, "release with no active slot");
        self.active = self.active.saturating_sub(1);
    }

    pub(crate) fn has_free_slot(&self, max_concurrent: usize) -> bool {
        self.active + self.starting < max_concurrent
    }

    /// Counter and records must agree.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, max_concurrent: usize) {
        let active = self
            .records
            .values()
            .filter(|r| r.status() == crate::task::TaskStatus::Active)
            .count();
        assert_eq!(active, self.active, "active counter drifted");
        assert_eq!(self.starting, 0, "start left in flight");
        assert!(active <= max_concurrent, "cap exceeded: {} > {}", active, max_concurrent);
        for r in self.records.values() {
            assert_eq!(
                r.status() == crate::task::TaskStatus::Active,
                r.has_handle(),
                "task {} handle ownership broken",
                r.id()
            );
        }
    }
}

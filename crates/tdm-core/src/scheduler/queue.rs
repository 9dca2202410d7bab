//! Admission queue: FIFO backlog of tasks waiting for a concurrency slot.

use std::collections::VecDeque;

use crate::task::TaskId;

/// Ordered backlog of not-yet-started tasks. No priorities and no dedup:
/// two submissions of the same locator are two independent entries.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    backlog: VecDeque<TaskId>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the back.
    pub fn enqueue(&mut self, id: TaskId) {
        self.backlog.push_back(id);
    }

    /// Removes and returns the front, or `None` when empty.
    pub fn dequeue_next(&mut self) -> Option<TaskId> {
        self.backlog.pop_front()
    }

    /// Drops `id` from the backlog (cancellation). Returns whether it was queued.
    pub fn remove(&mut self, id: TaskId) -> bool {
        match self.backlog.iter().position(|queued| *queued == id) {
            Some(pos) => {
                self.backlog.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }
}

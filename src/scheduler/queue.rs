//! Priority work queue: four steal deques fed by lock-free inboxes.
//!
//! Submitters from any thread push into a lane's inbox; only the owning
//! worker moves tasks from inboxes into its deques (`pop_task`), which
//! preserves the deque's single-producer contract while keeping the
//! submission path wait-free. Thieves take from a lane's deque first and
//! fall back to its inbox, so work is never stranded behind a busy owner.

use crate::priority::Priority;
use crate::scheduler::deque::StealDeque;
use crate::task::Task;
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, Ordering};

/// One priority lane: a submission inbox plus the owner's local deque.
struct Lane {
    inbox: SegQueue<Task>,
    deque: StealDeque<Task>,
}

impl Lane {
    fn new() -> Self {
        Self {
            inbox: SegQueue::new(),
            deque: StealDeque::new(),
        }
    }

    /// Owner-only: move every queued submission into the local deque.
    fn absorb(&self) {
        while let Some(task) = self.inbox.pop() {
            self.deque.push(task);
        }
    }

    fn is_empty(&self) -> bool {
        self.deque.is_empty() && self.inbox.is_empty()
    }

    fn len(&self) -> usize {
        self.deque.len() + self.inbox.len()
    }
}

/// A worker's priority-indexed task queue.
///
/// Bundles one lane per [`Priority`] class plus an `active` flag. When the
/// flag is false no new task may be pushed; tasks already queued still
/// drain.
pub struct WorkQueue {
    lanes: [Lane; Priority::LEVELS],
    active: AtomicBool,
}

impl WorkQueue {
    /// Creates an empty, active queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lanes: std::array::from_fn(|_| Lane::new()),
            active: AtomicBool::new(true),
        }
    }

    /// Enqueues a task on the lane for `priority`. Wait-free, any thread.
    pub fn push_task(&self, priority: Priority, task: Task) {
        self.lanes[priority.index()].inbox.push(task);
    }

    /// Takes the highest-priority available task. Owner-only, LIFO within
    /// a lane.
    pub fn pop_task(&self) -> Option<Task> {
        for lane in self.lanes.iter().rev() {
            lane.absorb();
            if let Some(task) = lane.deque.pop() {
                return Some(task);
            }
        }
        None
    }

    /// Steals the highest-priority available task. Safe from any thread,
    /// FIFO within a lane.
    pub fn steal_task(&self) -> Option<Task> {
        for lane in self.lanes.iter().rev() {
            if let Some(task) = lane.deque.steal() {
                return Some(task);
            }
            if let Some(task) = lane.inbox.pop() {
                return Some(task);
            }
        }
        None
    }

    /// Advisory emptiness snapshot across every lane; not a barrier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(Lane::is_empty)
    }

    /// Advisory task count across every lane.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.iter().map(Lane::len).sum()
    }

    /// Whether this queue accepts new tasks.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

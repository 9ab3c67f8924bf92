//! Worker thread logic.

use crate::platform;
use crate::scheduler::queue::WorkQueue;
use crate::scheduler::PoolShared;
use crate::task::Task;
use crate::util::XorShiftRng;
use smallvec::SmallVec;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, trace};

/// Identifier for a pool worker.
pub type WorkerId = usize;

/// A worker thread's state: its queue index, NUMA node, shared pool handle,
/// and steal-order scratch.
pub(crate) struct Worker {
    id: WorkerId,
    numa_node: usize,
    shared: Arc<PoolShared>,
    /// Per-worker RNG, entropy-seeded so sweeps differ across workers and
    /// runs. A deterministic order produces pathological contention under
    /// fan-out loads.
    rng: XorShiftRng,
    /// Peer indices visited on a steal sweep, reshuffled every sweep.
    steal_order: SmallVec<[usize; 16]>,
}

impl Worker {
    pub(crate) fn new(id: WorkerId, numa_node: usize, shared: Arc<PoolShared>) -> Self {
        let steal_order = (0..shared.queues.len()).filter(|&peer| peer != id).collect();
        Self {
            id,
            numa_node,
            shared,
            rng: XorShiftRng::from_entropy(),
            steal_order,
        }
    }

    /// Runs the scheduling loop until shutdown is observed with every queue
    /// drained.
    pub(crate) fn run(mut self) {
        self.bind_numa();

        loop {
            // 1. Own queue, highest priority first.
            if let Some(task) = self.shared.queues[self.id].pop_task() {
                self.execute(task);
                continue;
            }

            // 2. Randomized sweep over the peers.
            if let Some(task) = self.steal_sweep() {
                self.execute(task);
                continue;
            }

            // 3. Idle back-off, then re-check the shutdown condition.
            self.shared.idle_count.fetch_add(1, Ordering::Relaxed);
            thread::sleep(self.shared.idle_sleep);
            self.shared.idle_count.fetch_sub(1, Ordering::Relaxed);

            if self.shared.stop.load(Ordering::Relaxed)
                && self.shared.queues.iter().all(WorkQueue::is_empty)
            {
                break;
            }
        }

        trace!(worker = self.id, "worker exiting");
    }

    fn bind_numa(&self) {
        if !self.shared.numa_pinning {
            return;
        }
        let Some(node) = self.shared.topology.node(self.numa_node) else {
            return;
        };
        match platform::bind_to_node(node) {
            Ok(()) => debug!(worker = self.id, node = node.id, "worker bound to NUMA node"),
            Err(err) => debug!(
                worker = self.id,
                node = node.id,
                %err,
                "NUMA binding unavailable, running unpinned"
            ),
        }
    }

    fn steal_sweep(&mut self) -> Option<Task> {
        self.rng.shuffle(&mut self.steal_order);
        for &peer in &self.steal_order {
            let queue = &self.shared.queues[peer];
            if !queue.is_active() {
                continue;
            }
            if let Some(task) = queue.steal_task() {
                return Some(task);
            }
        }
        None
    }

    /// Invokes a task, swallowing panics so one bad task cannot take the
    /// worker down. No scheduler lock is held across the call.
    fn execute(&self, task: Task) {
        if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
            error!(worker = self.id, "task panicked; worker continues");
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("numa_node", &self.numa_node)
            .finish_non_exhaustive()
    }
}

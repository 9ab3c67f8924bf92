//! Scheduler façade: the work-stealing pool, the host-dispatcher variant,
//! and the process-wide default instance.

pub mod deque;
pub mod dispatch;
pub mod queue;
pub mod worker;

use crate::config::{SchedulerBuilder, SchedulerConfig};
use crate::error::Error;
use crate::platform::NumaTopology;
use crate::priority::Priority;
use crate::task::Task;
use dispatch::HostScheduler;
use parking_lot::Mutex;
use queue::WorkQueue;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, trace};
use worker::Worker;

/// Over-partitioning multiplier for bulk fan-out: enough chunks for
/// steal-based balancing without unbounded dispatch overhead.
const BULK_CHUNK_FACTOR: u32 = 8;

/// State shared between the façade and every worker thread.
pub(crate) struct PoolShared {
    pub(crate) queues: Vec<WorkQueue>,
    pub(crate) stop: AtomicBool,
    pub(crate) idle_count: AtomicU32,
    pub(crate) active_threads: AtomicU32,
    pub(crate) next_queue: AtomicUsize,
    pub(crate) default_priority: AtomicU8,
    pub(crate) idle_sleep: Duration,
    pub(crate) numa_pinning: bool,
    pub(crate) topology: NumaTopology,
}

/// A fixed pool of work-stealing worker threads.
///
/// Submissions are spread round-robin across per-worker priority queues;
/// idle workers rebalance by stealing from randomly-ordered peers. The pool
/// size is fixed from construction to destruction. Dropping the scheduler
/// requests a stop, drains every queued task, and joins all workers.
pub struct SystemScheduler {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl SystemScheduler {
    /// Creates a pool with `thread_count` workers (0 = hardware
    /// concurrency) and the given default priority.
    ///
    /// # Errors
    ///
    /// Fails when a worker thread cannot be spawned.
    pub fn new(default_priority: Priority, thread_count: usize) -> Result<Self, Error> {
        SchedulerBuilder::new()
            .default_priority(default_priority)
            .worker_threads(thread_count)
            .build()
    }

    pub(crate) fn from_config(mut config: SchedulerConfig) -> Result<Self, Error> {
        config.normalize();
        let worker_count = config.worker_threads;
        let topology = NumaTopology::probe();

        let shared = Arc::new(PoolShared {
            queues: (0..worker_count).map(|_| WorkQueue::new()).collect(),
            stop: AtomicBool::new(false),
            idle_count: AtomicU32::new(0),
            active_threads: AtomicU32::new(u32::try_from(worker_count).unwrap_or(u32::MAX)),
            next_queue: AtomicUsize::new(0),
            default_priority: AtomicU8::new(config.default_priority.index() as u8),
            idle_sleep: config.idle_sleep,
            numa_pinning: config.numa_pinning,
            topology,
        });

        let node_count = shared.topology.node_count();
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let worker = Worker::new(id, id % node_count, Arc::clone(&shared));
            let spawn = std::thread::Builder::new()
                .name(format!("{}-{id}", config.thread_name_prefix))
                .stack_size(config.thread_stack_size)
                .spawn(move || worker.run());
            match spawn {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    // Roll back the partial pool before failing construction.
                    shared.stop.store(true, Ordering::Relaxed);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(Error::thread_spawn(source));
                }
            }
        }

        debug!(workers = worker_count, nodes = node_count, "scheduler started");
        Ok(Self { shared, workers })
    }

    /// Enqueues a task. Non-blocking; submissions after shutdown are
    /// silently dropped.
    pub fn schedule<F>(&self, priority: Priority, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(priority, Task::new(f));
    }

    /// Enqueues a task at the scheduler's default priority.
    pub fn schedule_default<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(self.get_priority(), f);
    }

    fn submit(&self, priority: Priority, task: Task) {
        if self.shared.stop.load(Ordering::Relaxed) {
            trace!("submission after shutdown dropped");
            return;
        }

        let queue_count = self.shared.queues.len();
        let mut chosen = self.shared.next_queue.fetch_add(1, Ordering::Relaxed) % queue_count;
        let mut scanned = 0;
        while !self.shared.queues[chosen].is_active() {
            chosen = (chosen + 1) % queue_count;
            scanned += 1;
            if scanned == queue_count {
                trace!("no active queue, submission dropped");
                return;
            }
        }
        self.shared.queues[chosen].push_task(priority, task);
    }

    /// Fan-out of `n` indexed invocations, chunked for steal-based
    /// balancing.
    ///
    /// `f(0)..f(n-1)` each run exactly once; indices ascend within a chunk,
    /// cross-chunk order is unspecified.
    pub fn bulk_schedule<F>(&self, n: u32, priority: Priority, f: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let active = self.get_active_thread_count().max(1);
        let f = Arc::new(f);
        for (start, end) in bulk_chunks(n, active) {
            let f = Arc::clone(&f);
            self.schedule(priority, move || {
                for index in start..end {
                    f(index);
                }
            });
        }
    }

    /// The priority applied when a submission does not name one.
    #[must_use]
    pub fn get_priority(&self) -> Priority {
        Priority::from_index(usize::from(self.shared.default_priority.load(Ordering::Relaxed)))
            .unwrap_or(Priority::Normal)
    }

    /// Replaces the default submission priority.
    pub fn set_priority(&self, priority: Priority) {
        self.shared
            .default_priority
            .store(priority.index() as u8, Ordering::Relaxed);
    }

    /// The pool's worker count.
    ///
    /// Set once at construction and never mutated, not even during
    /// shutdown; `bulk_schedule` reads it for its chunk arithmetic.
    #[must_use]
    pub fn get_active_thread_count(&self) -> u32 {
        self.shared.active_threads.load(Ordering::Relaxed)
    }

    /// Snapshot of the number of workers currently in idle back-off.
    #[must_use]
    pub fn idle_count(&self) -> u32 {
        self.shared.idle_count.load(Ordering::Relaxed)
    }

    /// Whether cooperative shutdown has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Relaxed)
    }

    /// Requests cooperative shutdown. Idempotent.
    ///
    /// Workers finish their current task, drain every queue, and exit.
    /// Tasks submitted after this call are silently dropped.
    pub fn set_stopped(&self) {
        if !self.shared.stop.swap(true, Ordering::Relaxed) {
            debug!("scheduler stop requested");
        }
    }

    /// Records an externally-captured task failure. Logged only; the pool
    /// keeps running.
    pub fn set_error(&self, error: &dyn std::error::Error) {
        error!(%error, "external task failure reported");
    }
}

impl Drop for SystemScheduler {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread terminated by panic");
            }
        }
    }
}

impl std::fmt::Debug for SystemScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemScheduler")
            .field("workers", &self.shared.queues.len())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Near-equal contiguous chunks of `[0, n)` for bulk fan-out.
///
/// The chunk count is `max(active_threads * 8, n)`; the first `n % chunks`
/// chunks absorb the remainder, and empty chunks are skipped.
pub(crate) fn bulk_chunks(n: u32, active_threads: u32) -> impl Iterator<Item = (u32, u32)> {
    let chunks = active_threads
        .saturating_mul(BULK_CHUNK_FACTOR)
        .max(n)
        .max(1);
    let chunk_size = n / chunks;
    let remainder = n % chunks;
    (0..chunks).filter_map(move |chunk| {
        let start = chunk * chunk_size + chunk.min(remainder);
        let end = start + chunk_size + u32::from(chunk < remainder);
        (start < end).then_some((start, end))
    })
}

/// The closed set of scheduler variants behind one submission surface.
///
/// Either the built-in work-stealing pool or a shim forwarding to a
/// host-provided dispatcher (see [`dispatch`]).
#[derive(Debug)]
pub enum Scheduler {
    /// The built-in work-stealing pool.
    Pool(SystemScheduler),
    /// A shim forwarding to a host dispatcher's global queues.
    Host(HostScheduler),
}

impl Scheduler {
    /// Enqueues a task. Non-blocking; dropped after shutdown.
    pub fn schedule<F>(&self, priority: Priority, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Pool(pool) => pool.schedule(priority, f),
            Self::Host(host) => host.schedule(priority, f),
        }
    }

    /// Enqueues a task at the default priority.
    pub fn schedule_default<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Self::Pool(pool) => pool.schedule_default(f),
            Self::Host(host) => host.schedule_default(f),
        }
    }

    /// Fan-out of `n` indexed invocations.
    pub fn bulk_schedule<F>(&self, n: u32, priority: Priority, f: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        match self {
            Self::Pool(pool) => pool.bulk_schedule(n, priority, f),
            Self::Host(host) => host.bulk_schedule(n, priority, f),
        }
    }

    /// The default submission priority.
    #[must_use]
    pub fn get_priority(&self) -> Priority {
        match self {
            Self::Pool(pool) => pool.get_priority(),
            Self::Host(host) => host.get_priority(),
        }
    }

    /// Replaces the default submission priority.
    pub fn set_priority(&self, priority: Priority) {
        match self {
            Self::Pool(pool) => pool.set_priority(priority),
            Self::Host(host) => host.set_priority(priority),
        }
    }

    /// The executing thread count (fixed pool size, or the host's best
    /// estimate).
    #[must_use]
    pub fn get_active_thread_count(&self) -> u32 {
        match self {
            Self::Pool(pool) => pool.get_active_thread_count(),
            Self::Host(host) => host.get_active_thread_count(),
        }
    }

    /// Whether cooperative shutdown has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        match self {
            Self::Pool(pool) => pool.is_stopped(),
            Self::Host(host) => host.is_stopped(),
        }
    }

    /// Requests cooperative shutdown. Idempotent.
    pub fn set_stopped(&self) {
        match self {
            Self::Pool(pool) => pool.set_stopped(),
            Self::Host(host) => host.set_stopped(),
        }
    }

    /// Records an externally-captured task failure.
    pub fn set_error(&self, error: &dyn std::error::Error) {
        match self {
            Self::Pool(pool) => pool.set_error(error),
            Self::Host(host) => host.set_error(error),
        }
    }
}

static SYSTEM_CONTEXT: Mutex<Option<Arc<Scheduler>>> = Mutex::new(None);

/// Returns the process-wide default scheduler, creating it on first touch.
///
/// The default is a pool with hardware-concurrency workers at `Normal`
/// priority. Tests and embedders may replace it with
/// [`install_system_scheduler`].
///
/// # Panics
///
/// Panics if the default pool cannot spawn its workers on first touch.
pub fn query_system_context() -> Arc<Scheduler> {
    let mut slot = SYSTEM_CONTEXT.lock();
    if let Some(scheduler) = slot.as_ref() {
        return Arc::clone(scheduler);
    }
    let pool = SystemScheduler::new(Priority::Normal, 0)
        .expect("default scheduler construction failed");
    let scheduler = Arc::new(Scheduler::Pool(pool));
    *slot = Some(Arc::clone(&scheduler));
    scheduler
}

/// Replaces the process-wide default scheduler.
pub fn install_system_scheduler(scheduler: Arc<Scheduler>) {
    *SYSTEM_CONTEXT.lock() = Some(scheduler);
}

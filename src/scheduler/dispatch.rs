//! Host-dispatcher shim.
//!
//! An alternative scheduler variant that bypasses the internal pool and
//! forwards every task to an OS-level global work queue. Most host
//! dispatchers expose only three bands, so the four priority classes
//! collapse coarsely: `Critical` folds into `High`.
//!
//! On macOS a built-in backend targets the Grand Central Dispatch global
//! queues; elsewhere the embedder supplies a [`HostQueue`] implementation.

use crate::platform;
use crate::priority::Priority;
use crate::task::Task;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

use super::bulk_chunks;

/// Coarse priority band understood by host dispatchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostBand {
    /// Background band.
    Low,
    /// Default band.
    Default,
    /// High band; also carries `Critical` work.
    High,
}

impl HostBand {
    /// Collapses a scheduler priority onto a host band.
    #[must_use]
    pub const fn from_priority(priority: Priority) -> Self {
        match priority {
            Priority::Low => Self::Low,
            Priority::Normal => Self::Default,
            Priority::High | Priority::Critical => Self::High,
        }
    }
}

/// A host-provided global work queue.
///
/// Implementations own the executing threads; the shim only maps bands and
/// hands tasks over.
pub trait HostQueue: Send + Sync {
    /// Enqueues a task on the band's global queue.
    fn dispatch(&self, band: HostBand, task: Task);
}

/// Scheduler variant forwarding submissions to a host dispatcher.
///
/// Lifecycle calls only keep flag bookkeeping: the host owns the threads,
/// so tasks already handed over keep running after
/// [`HostScheduler::set_stopped`].
pub struct HostScheduler {
    queue: Arc<dyn HostQueue>,
    default_priority: AtomicU8,
    stopped: AtomicBool,
}

impl HostScheduler {
    /// Wraps a host queue with the scheduler submission surface.
    #[must_use]
    pub fn new(queue: Arc<dyn HostQueue>, default_priority: Priority) -> Self {
        Self {
            queue,
            default_priority: AtomicU8::new(default_priority.index() as u8),
            stopped: AtomicBool::new(false),
        }
    }

    /// A shim over the process-global GCD queues at `Normal` priority.
    #[cfg(target_os = "macos")]
    #[must_use]
    pub fn global() -> Self {
        Self::new(Arc::new(GcdQueue), Priority::Normal)
    }

    /// A shim over the platform's built-in dispatcher, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unsupported`](crate::ErrorKind::Unsupported) on
    /// platforms without a built-in global work queue; callers fall back to
    /// the internal pool.
    pub fn try_global() -> Result<Self, crate::error::Error> {
        #[cfg(target_os = "macos")]
        {
            Ok(Self::global())
        }
        #[cfg(not(target_os = "macos"))]
        {
            Err(crate::error::Error::new(crate::error::ErrorKind::Unsupported))
        }
    }

    /// Forwards a task to the host queue for `priority`'s band.
    pub fn schedule<F>(&self, priority: Priority, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.stopped.load(Ordering::Relaxed) {
            trace!("submission after shutdown dropped");
            return;
        }
        self.queue
            .dispatch(HostBand::from_priority(priority), Task::new(f));
    }

    /// Forwards a task at the default priority.
    pub fn schedule_default<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(self.get_priority(), f);
    }

    /// Fan-out of `n` indexed invocations through the host queue.
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

    /// The default submission priority.
    #[must_use]
    pub fn get_priority(&self) -> Priority {
        Priority::from_index(usize::from(self.default_priority.load(Ordering::Relaxed)))
            .unwrap_or(Priority::Normal)
    }

    /// Replaces the default submission priority.
    pub fn set_priority(&self, priority: Priority) {
        self.default_priority
            .store(priority.index() as u8, Ordering::Relaxed);
    }

    /// The host's thread count is not observable; reports hardware
    /// concurrency as the best available estimate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_active_thread_count(&self) -> u32 {
        platform::hardware_concurrency().min(u32::MAX as usize) as u32
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Stops accepting submissions. Idempotent. Tasks already handed to the
    /// host keep running.
    pub fn set_stopped(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    /// Records an externally-captured task failure.
    pub fn set_error(&self, error: &dyn std::error::Error) {
        error!(%error, "external task failure reported");
    }
}

impl std::fmt::Debug for HostScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostScheduler")
            .field("default_priority", &self.get_priority())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

#[cfg(target_os = "macos")]
pub use gcd::GcdQueue;

#[cfg(target_os = "macos")]
mod gcd {
    //! Grand Central Dispatch backend.

    use super::{HostBand, HostQueue};
    use crate::task::Task;
    use std::ffi::c_void;
    use std::os::raw::{c_long, c_ulong};
    use tracing::error;

    #[allow(non_camel_case_types)]
    type dispatch_queue_t = *mut c_void;

    const DISPATCH_QUEUE_PRIORITY_HIGH: c_long = 2;
    const DISPATCH_QUEUE_PRIORITY_DEFAULT: c_long = 0;
    const DISPATCH_QUEUE_PRIORITY_LOW: c_long = -2;

    extern "C" {
        fn dispatch_get_global_queue(identifier: c_long, flags: c_ulong) -> dispatch_queue_t;
        fn dispatch_async_f(
            queue: dispatch_queue_t,
            context: *mut c_void,
            work: extern "C" fn(*mut c_void),
        );
    }

    extern "C" fn run_task(context: *mut c_void) {
        let task = *unsafe { Box::from_raw(context.cast::<Task>()) };
        // Unwinding across the FFI boundary would abort; swallow instead.
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task.run())).is_err() {
            error!("host-dispatched task panicked");
        }
    }

    /// The process-global Grand Central Dispatch queues.
    #[derive(Debug, Default)]
    pub struct GcdQueue;

    impl HostQueue for GcdQueue {
        fn dispatch(&self, band: HostBand, task: Task) {
            let identifier = match band {
                HostBand::Low => DISPATCH_QUEUE_PRIORITY_LOW,
                HostBand::Default => DISPATCH_QUEUE_PRIORITY_DEFAULT,
                HostBand::High => DISPATCH_QUEUE_PRIORITY_HIGH,
            };
            let context = Box::into_raw(Box::new(task)).cast::<c_void>();
            unsafe {
                let queue = dispatch_get_global_queue(identifier, 0);
                dispatch_async_f(queue, context, run_task);
            }
        }
    }
}

//! Scheduler configuration types.
//!
//! These types hold the concrete values that drive pool behavior. Use
//! [`SchedulerBuilder`] to construct a scheduler rather than filling in a
//! [`SchedulerConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `worker_threads` | available CPU parallelism |
//! | `default_priority` | `Normal` |
//! | `thread_name_prefix` | `"quarterdeck-worker"` |
//! | `thread_stack_size` | 2 MiB |
//! | `idle_sleep` | 10 µs |
//! | `numa_pinning` | `true` |

use crate::error::Error;
use crate::platform;
use crate::priority::Priority;
use crate::scheduler::SystemScheduler;
use std::time::Duration;

const DEFAULT_THREAD_NAME_PREFIX: &str = "quarterdeck-worker";
const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;
const DEFAULT_IDLE_SLEEP: Duration = Duration::from_micros(10);

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads (0 = available parallelism).
    pub worker_threads: usize,
    /// Priority applied when a submission does not name one.
    pub default_priority: Priority,
    /// Name prefix for worker threads.
    pub thread_name_prefix: String,
    /// Stack size per worker thread.
    pub thread_stack_size: usize,
    /// Sleep interval for an idle worker between work probes.
    pub idle_sleep: Duration,
    /// Bind each worker to its NUMA node on Linux.
    pub numa_pinning: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            default_priority: Priority::Normal,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            numa_pinning: true,
        }
    }
}

impl SchedulerConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = platform::hardware_concurrency();
        }
        if self.thread_stack_size == 0 {
            self.thread_stack_size = DEFAULT_THREAD_STACK_SIZE;
        }
        if self.idle_sleep.is_zero() {
            self.idle_sleep = DEFAULT_IDLE_SLEEP;
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = DEFAULT_THREAD_NAME_PREFIX.to_string();
        }
    }
}

/// Builder for [`SystemScheduler`].
///
/// ```no_run
/// use quarterdeck::{Priority, SchedulerBuilder};
///
/// let scheduler = SchedulerBuilder::new()
///     .worker_threads(4)
///     .default_priority(Priority::High)
///     .build()
///     .expect("pool should start");
/// scheduler.schedule_default(|| println!("scheduled"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count (0 = available parallelism).
    #[must_use]
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Sets the priority used when a submission does not name one.
    #[must_use]
    pub fn default_priority(mut self, priority: Priority) -> Self {
        self.config.default_priority = priority;
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the per-worker stack size in bytes.
    #[must_use]
    pub fn thread_stack_size(mut self, bytes: usize) -> Self {
        self.config.thread_stack_size = bytes;
        self
    }

    /// Sets the idle back-off sleep interval.
    #[must_use]
    pub fn idle_sleep(mut self, interval: Duration) -> Self {
        self.config.idle_sleep = interval;
        self
    }

    /// Enables or disables NUMA pinning.
    #[must_use]
    pub fn numa_pinning(mut self, enabled: bool) -> Self {
        self.config.numa_pinning = enabled;
        self
    }

    /// Spawns the worker pool.
    ///
    /// # Errors
    ///
    /// Fails when a worker thread cannot be spawned; any workers started
    /// before the failure are shut down and joined first.
    pub fn build(self) -> Result<SystemScheduler, Error> {
        SystemScheduler::from_config(self.config)
    }
}

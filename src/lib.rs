//! Multi-priority work-stealing task scheduler for CPU-bound workloads.
//!
//! Quarterdeck executes opaque `FnOnce` tasks on a fixed pool of worker
//! threads. Each worker owns a bundle of four Chase-Lev deques, one per
//! [`Priority`] class; submissions are spread round-robin across workers
//! and idle workers rebalance load by stealing from randomly-ordered
//! peers. On Linux, workers optionally pin themselves to their NUMA node.
//!
//! Tasks are fire-and-forget: nothing is returned from a submission, and a
//! rejected submission (after shutdown) is an absence of effect plus a log
//! entry. There is no per-task cancellation; pool-wide shutdown drains
//! every queued task before the workers exit.
//!
//! # Quick start
//!
//! ```no_run
//! use quarterdeck::{Priority, SchedulerBuilder};
//!
//! let scheduler = SchedulerBuilder::new()
//!     .worker_threads(4)
//!     .build()
//!     .expect("pool should start");
//!
//! scheduler.schedule(Priority::High, || {
//!     // CPU-bound work here.
//! });
//! scheduler.bulk_schedule(1_000, Priority::Normal, |i| {
//!     // Invoked once for every index in [0, 1000).
//!     let _ = i;
//! });
//! // Dropping the scheduler drains remaining tasks and joins the workers.
//! ```
//!
//! A process-wide default instance is available through
//! [`query_system_context`]; tests can swap it with
//! [`install_system_scheduler`]. Environments that prefer a host-provided
//! dispatcher over the internal pool can use the
//! [`HostScheduler`](scheduler::dispatch::HostScheduler) variant.

pub mod config;
pub mod error;
pub mod platform;
pub mod priority;
pub mod scheduler;
pub mod task;
pub mod util;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_logging;

pub use config::{SchedulerBuilder, SchedulerConfig};
pub use error::{Error, ErrorKind};
pub use priority::Priority;
pub use scheduler::dispatch::{HostBand, HostQueue, HostScheduler};
pub use scheduler::{install_system_scheduler, query_system_context, Scheduler, SystemScheduler};
pub use task::Task;

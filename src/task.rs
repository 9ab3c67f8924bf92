//! Type-erased unit-of-work holder.

use core::fmt;

/// An opaque, movable unit of work.
///
/// A task owns its closure. Once submitted, the task is exclusively owned by
/// the queue slot it lands in; ownership transfers to the executing worker
/// at the moment of a successful pop or steal. Tasks are fire-and-forget:
/// they return nothing and the scheduler does not capture their outcome.
pub struct Task {
    f: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Wraps a closure as a schedulable task.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    /// Consumes the task and invokes its closure.
    #[inline]
    pub fn run(self) {
        (self.f)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

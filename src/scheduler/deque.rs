//! Chase-Lev work-stealing deque.
//!
//! Single-producer, multi-consumer: the owning worker pushes and pops at the
//! bottom (LIFO), any thread may steal from the top (FIFO). Owner operations
//! are wait-free; steals are lock-free and commit only through a CAS on
//! `top`, which also resolves the last-element race against an owner pop.
//!
//! Slots hold heap pointers so a thief that loses the `top` CAS never
//! observes a moved-from value. The buffer doubles on overflow; replaced
//! buffers stay alive until the deque drops, so a steal racing a grow can
//! still read its (stale) buffer and either fail the CAS or take the task
//! exactly once.

use parking_lot::Mutex;
use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};

/// Initial slot count for a fresh deque.
const DEFAULT_CAPACITY: usize = 1024;

struct Buffer<T> {
    mask: usize,
    slots: Box<[AtomicPtr<T>]>,
}

impl<T> Buffer<T> {
    fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let slots = (0..capacity)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect();
        Self {
            mask: capacity - 1,
            slots,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn get(&self, index: isize) -> *mut T {
        self.slots[index as usize & self.mask].load(Ordering::Acquire)
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn put(&self, index: isize, value: *mut T) {
        self.slots[index as usize & self.mask].store(value, Ordering::Release);
    }
}

/// A lock-free work-stealing deque.
///
/// `bottom - top` is the number of live entries and stays within
/// `[0, capacity]` at every quiescent point. Only the owner mutates
/// `bottom`; thieves advance `top` through CAS.
pub struct StealDeque<T> {
    /// Bottom index; mutated only by the owner.
    bottom: AtomicIsize,
    /// Top index; advanced by thieves (and the owner's last-element CAS).
    top: AtomicIsize,
    /// Current slot buffer; swapped by the owner on growth.
    buffer: AtomicPtr<Buffer<T>>,
    /// Buffers replaced by growth, kept alive for in-flight steals.
    retired: Mutex<Vec<*mut Buffer<T>>>,
}

unsafe impl<T: Send> Send for StealDeque<T> {}
unsafe impl<T: Send> Sync for StealDeque<T> {}

impl<T> StealDeque<T> {
    /// Creates a deque with the default capacity of 1024 slots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a deque with at least `capacity` slots (rounded up to a
    /// power of two).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        let buffer = Box::new(Buffer::new(capacity));
        Self {
            bottom: AtomicIsize::new(0),
            top: AtomicIsize::new(0),
            buffer: AtomicPtr::new(Box::into_raw(buffer)),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Pushes a value at the bottom. Owner-only.
    pub fn push(&self, value: T) {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);

        let mut buffer = unsafe { &*self.buffer.load(Ordering::Relaxed) };
        if b - t >= buffer.capacity() as isize {
            self.grow(b);
            buffer = unsafe { &*self.buffer.load(Ordering::Relaxed) };
        }

        buffer.put(b, Box::into_raw(Box::new(value)));
        self.bottom.store(b + 1, Ordering::Release);
    }

    /// Pops the most recently pushed value. Owner-only, LIFO.
    pub fn pop(&self) -> Option<T> {
        let b = self.bottom.load(Ordering::Relaxed) - 1;
        // The seq-cst store/load pair resolves the last-element race
        // against a concurrent steal; weaker orderings are unsound here.
        self.bottom.store(b, Ordering::SeqCst);
        let t = self.top.load(Ordering::SeqCst);

        if t <= b {
            let buffer = unsafe { &*self.buffer.load(Ordering::Relaxed) };
            let slot = buffer.get(b);
            if t == b {
                // Last element: race concurrent thieves for it via `top`.
                let won = self
                    .top
                    .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok();
                self.bottom.store(b + 1, Ordering::Relaxed);
                if !won {
                    return None;
                }
            }
            Some(unsafe { *Box::from_raw(slot) })
        } else {
            self.bottom.store(b + 1, Ordering::Relaxed);
            None
        }
    }

    /// Steals the oldest value. Safe from any thread, FIFO.
    pub fn steal(&self) -> Option<T> {
        let t = self.top.load(Ordering::Acquire);
        let b = self.bottom.load(Ordering::Acquire);
        if t >= b {
            return None;
        }

        let buffer = unsafe { &*self.buffer.load(Ordering::Acquire) };
        let slot = buffer.get(t);
        // The task is ours only once the CAS lands; a lost race means some
        // other thread (thief or owner) took it, and `slot` is left alone.
        if self
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            Some(unsafe { *Box::from_raw(slot) })
        } else {
            None
        }
    }

    /// Advisory entry count. Racy by nature; never use as a barrier.
    #[must_use]
    pub fn len(&self) -> usize {
        let t = self.top.load(Ordering::Acquire);
        let b = self.bottom.load(Ordering::Acquire);
        usize::try_from(b - t).unwrap_or(0)
    }

    /// Advisory emptiness snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let t = self.top.load(Ordering::Acquire);
        let b = self.bottom.load(Ordering::Acquire);
        t >= b
    }

    /// Current slot capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        unsafe { &*self.buffer.load(Ordering::Acquire) }.capacity()
    }

    /// Doubles the buffer. Owner-only, called from `push` on overflow.
    fn grow(&self, bottom: isize) {
        let old_ptr = self.buffer.load(Ordering::Relaxed);
        let old = unsafe { &*old_ptr };
        let new = Box::new(Buffer::new(old.capacity() * 2));

        // Copying entries below the live top is harmless: those indices are
        // already claimed and never read again.
        let top = self.top.load(Ordering::Acquire);
        for i in top..bottom {
            new.put(i, old.get(i));
        }

        self.buffer.store(Box::into_raw(new), Ordering::Release);
        // An in-flight steal may still inspect the old buffer; it stays
        // alive until the deque drops.
        self.retired.lock().push(old_ptr);
    }
}

impl<T> Default for StealDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for StealDeque<T> {
    fn drop(&mut self) {
        // Reclaim unconsumed entries without running them.
        while self.pop().is_some() {}

        let buffer = *self.buffer.get_mut();
        unsafe { drop(Box::from_raw(buffer)) };
        for retired in self.retired.get_mut().drain(..) {
            unsafe { drop(Box::from_raw(retired)) };
        }
    }
}

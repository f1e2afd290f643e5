//! Spin-locked ring buffer shared between threads.
//!
//! Every operation takes the lock for its own duration only. Two calls are
//! two critical sections: a `len()` followed by a `pop_front()` may observe
//! different states.

use std::fmt;
use std::ptr;

use crate::{CircularBuffer, Full, SpinMutex, SpinMutexGuard};

/// A [`CircularBuffer`] whose operations are serialized by a [`SpinMutex`].
///
/// All methods take `&self`, so the buffer can be shared by reference
/// (e.g. one per worker thread inside a dispatcher).
///
/// # Example
///
/// ```
/// use farmem_queue::SyncCircularBuffer;
/// use std::thread;
///
/// let queue: SyncCircularBuffer<u32> = SyncCircularBuffer::with_capacity(64);
///
/// thread::scope(|s| {
///     s.spawn(|| {
///         for i in 0..10 {
///             while queue.push_back(i).is_err() {
///                 std::hint::spin_loop();
///             }
///         }
///     });
/// });
///
/// assert_eq!(queue.len(), 10);
/// assert_eq!(queue.pop_front(), Some(0));
/// ```
pub struct SyncCircularBuffer<T, const CAP: usize = 0> {
    inner: SpinMutex<CircularBuffer<T, CAP>>,
    capacity: usize,
}

impl<T, const CAP: usize> SyncCircularBuffer<T, CAP> {
    /// Creates an empty buffer with the fixed capacity `CAP`.
    ///
    /// # Panics
    ///
    /// Panics if `CAP` is 0.
    pub fn new() -> Self {
        Self::from_buffer(CircularBuffer::new())
    }

    fn from_buffer(buf: CircularBuffer<T, CAP>) -> Self {
        Self {
            capacity: buf.capacity(),
            inner: SpinMutex::new(buf),
        }
    }

    /// Returns the maximum number of items the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items at the moment of the call.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the buffer was empty at the moment of the call.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Appends an item at the tail.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the buffer is full.
    #[inline]
    pub fn push_back(&self, item: T) -> Result<(), Full<T>> {
        self.inner.lock().push_back(item)
    }

    /// Prepends an item at the head.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the buffer is full.
    #[inline]
    pub fn push_front(&self, item: T) -> Result<(), Full<T>> {
        self.inner.lock().push_front(item)
    }

    /// Appends an item, evicting and returning the oldest if full.
    #[inline]
    pub fn push_back_override(&self, item: T) -> Option<T> {
        self.inner.lock().push_back_override(item)
    }

    /// Removes and returns the item at the head, or `None` if empty.
    #[inline]
    pub fn pop_front(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Removes and returns the item at the tail, or `None` if empty.
    #[inline]
    pub fn pop_back(&self) -> Option<T> {
        self.inner.lock().pop_back()
    }

    /// Moves about half of `victim`'s items into `self` as one atomic step.
    ///
    /// Both locks are held for the transfer, acquired in address order so
    /// two threads stealing from each other cannot deadlock. This is a
    /// load-balancing hint: a `false` return only means nothing could be
    /// moved at this instant.
    ///
    /// See [`CircularBuffer::work_steal`] for which items move.
    pub fn work_steal(&self, victim: &Self) -> bool {
        if ptr::eq(self, victim) {
            return false;
        }
        let (mut mine, mut theirs) = self.lock_pair(victim);
        let moved = mine.steal_from(&mut theirs);
        if moved > 0 {
            tracing::trace!(moved, remaining = theirs.len(), "work steal");
        }
        moved > 0
    }

    fn lock_pair<'a>(
        &'a self,
        other: &'a Self,
    ) -> (
        SpinMutexGuard<'a, CircularBuffer<T, CAP>>,
        SpinMutexGuard<'a, CircularBuffer<T, CAP>>,
    ) {
        if (self as *const Self) < (other as *const Self) {
            let mine = self.inner.lock();
            let theirs = other.inner.lock();
            (mine, theirs)
        } else {
            let theirs = other.inner.lock();
            let mine = self.inner.lock();
            (mine, theirs)
        }
    }

    /// Drops every item.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Calls `f` on each item from head to tail while holding the lock.
    ///
    /// `f` must not touch this buffer again or it will spin forever.
    pub fn for_each<F: FnMut(&T)>(&self, f: F) {
        self.inner.lock().for_each(f);
    }

    /// Runs `f` with exclusive access to the underlying buffer, making a
    /// sequence of operations atomic with respect to other threads.
    pub fn with<R>(&self, f: impl FnOnce(&mut CircularBuffer<T, CAP>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Consumes the wrapper, returning the unsynchronized buffer.
    pub fn into_inner(self) -> CircularBuffer<T, CAP> {
        self.inner.into_inner()
    }
}

impl<T> SyncCircularBuffer<T> {
    /// Creates an empty buffer holding up to `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_buffer(CircularBuffer::with_capacity(capacity))
    }
}

impl<T, const CAP: usize> From<CircularBuffer<T, CAP>> for SyncCircularBuffer<T, CAP> {
    fn from(buf: CircularBuffer<T, CAP>) -> Self {
        Self::from_buffer(buf)
    }
}

impl<T, const CAP: usize> fmt::Debug for SyncCircularBuffer<T, CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCircularBuffer")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

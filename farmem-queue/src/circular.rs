//! Single-owner ring buffer.
//!
//! The buffer holds up to `capacity` live items in `capacity + 1` physical
//! slots, so `head == tail` always means empty and `head == tail + 1`
//! (mod slots) always means full. No separate length counter is kept.
//!
//! ```text
//!   head            tail
//!    v               v
//! ┌────┬────┬────┬────┬────┐
//! │ a  │ b  │ c  │    │    │   slots = capacity + 1
//! └────┴────┴────┴────┴────┘
//! ```
//!
//! Items live in `[head, tail)`, wrapping at the end of the slot array.

use std::fmt;
use std::mem::MaybeUninit;

/// Error returned when a push finds the buffer full.
///
/// Contains the item that could not be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the item that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

/// A bounded ring buffer with push/pop at both ends.
///
/// `CAP > 0` selects a fixed capacity known at compile time (construct with
/// [`new`](Self::new)); `CAP == 0` (the default) selects a capacity chosen at
/// runtime (construct with [`with_capacity`](CircularBuffer::with_capacity)).
///
/// Not synchronized. Wrap in [`SyncCircularBuffer`](crate::SyncCircularBuffer)
/// to share between threads.
///
/// # Example
///
/// ```
/// use farmem_queue::CircularBuffer;
///
/// let mut buf: CircularBuffer<&str, 4> = CircularBuffer::new();
/// buf.push_back("b").unwrap();
/// buf.push_front("a").unwrap();
///
/// let items: Vec<_> = buf.iter().copied().collect();
/// assert_eq!(items, ["a", "b"]);
/// ```
pub struct CircularBuffer<T, const CAP: usize = 0> {
    slots: Box<[MaybeUninit<T>]>,
    head: usize,
    tail: usize,
}

impl<T, const CAP: usize> CircularBuffer<T, CAP> {
    /// Creates an empty buffer with the fixed capacity `CAP`.
    ///
    /// # Panics
    ///
    /// Panics if `CAP` is 0; dynamic buffers are built with
    /// [`with_capacity`](CircularBuffer::with_capacity).
    pub fn new() -> Self {
        assert!(CAP > 0, "fixed capacity must be > 0");
        Self::allocate(CAP)
    }

    fn allocate(capacity: usize) -> Self {
        Self {
            slots: Box::new_uninit_slice(capacity + 1),
            head: 0,
            tail: 0,
        }
    }

    /// Returns the maximum number of items the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns the number of items currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        let slots = self.slots.len();
        (self.tail + slots - self.head) % slots
    }

    /// Returns `true` if the buffer holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Returns `true` if no more items can be pushed without eviction.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.head == self.wrap_next(self.tail)
    }

    #[inline(always)]
    fn wrap_next(&self, idx: usize) -> usize {
        if idx + 1 == self.slots.len() { 0 } else { idx + 1 }
    }

    #[inline(always)]
    fn wrap_prev(&self, idx: usize) -> usize {
        if idx == 0 { self.slots.len() - 1 } else { idx - 1 }
    }

    /// Appends an item at the tail.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the buffer is full.
    #[inline]
    pub fn push_back(&mut self, item: T) -> Result<(), Full<T>> {
        if self.is_full() {
            return Err(Full(item));
        }
        self.slots[self.tail].write(item);
        self.tail = self.wrap_next(self.tail);
        Ok(())
    }

    /// Prepends an item at the head.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the buffer is full.
    #[inline]
    pub fn push_front(&mut self, item: T) -> Result<(), Full<T>> {
        if self.is_full() {
            return Err(Full(item));
        }
        self.head = self.wrap_prev(self.head);
        self.slots[self.head].write(item);
        Ok(())
    }

    /// Appends an item at the tail, evicting the oldest item if full.
    ///
    /// Returns the evicted item, or `None` if there was room.
    #[inline]
    pub fn push_back_override(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() { self.pop_front() } else { None };
        self.slots[self.tail].write(item);
        self.tail = self.wrap_next(self.tail);
        evicted
    }

    /// Removes and returns the item at the head, or `None` if empty.
    #[inline]
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // Safety: slots in [head, tail) are initialized.
        let item = unsafe { self.slots[self.head].assume_init_read() };
        self.head = self.wrap_next(self.head);
        Some(item)
    }

    /// Removes and returns the item at the tail, or `None` if empty.
    #[inline]
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.tail = self.wrap_prev(self.tail);
        // Safety: the slot just behind tail is initialized.
        Some(unsafe { self.slots[self.tail].assume_init_read() })
    }

    /// Returns the item at the head without removing it.
    #[inline]
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // Safety: head is initialized when non-empty.
        Some(unsafe { self.slots[self.head].assume_init_ref() })
    }

    /// Returns the item at the tail without removing it.
    #[inline]
    pub fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // Safety: the slot behind tail is initialized when non-empty.
        Some(unsafe { self.slots[self.wrap_prev(self.tail)].assume_init_ref() })
    }

    /// Moves about half of `victim`'s items into `self`.
    ///
    /// Takes `victim.len() / 2` items (at least one when `victim` is
    /// non-empty), bounded by the free space in `self`. The stolen items are
    /// the newest ones in `victim`; they are appended to `self` in their
    /// original relative order. The total number of items across both
    /// buffers is unchanged.
    ///
    /// Returns `false` if nothing was moved (`victim` empty or `self` full).
    pub fn work_steal(&mut self, victim: &mut Self) -> bool {
        self.steal_from(victim) > 0
    }

    pub(crate) fn steal_from(&mut self, victim: &mut Self) -> usize {
        let available = victim.len();
        if available == 0 {
            return 0;
        }
        let room = self.capacity() - self.len();
        let count = (available / 2).max(1).min(room);
        if count == 0 {
            return 0;
        }

        let victim_slots = victim.slots.len();
        let start = (victim.tail + victim_slots - count) % victim_slots;
        let mut idx = start;
        for _ in 0..count {
            // Safety: idx walks the last `count` initialized slots of victim;
            // victim.tail is moved back below so they are not read twice.
            let item = unsafe { victim.slots[idx].assume_init_read() };
            self.slots[self.tail].write(item);
            self.tail = self.wrap_next(self.tail);
            idx = victim.wrap_next(idx);
        }
        victim.tail = start;
        count
    }

    /// Drops every item, leaving the buffer empty.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// Returns an iterator over the items from head to tail.
    pub fn iter(&self) -> Iter<'_, T, CAP> {
        Iter {
            buf: self,
            pos: self.head,
        }
    }

    /// Calls `f` on each item from head to tail without removing anything.
    pub fn for_each<F: FnMut(&T)>(&self, f: F) {
        self.iter().for_each(f);
    }

    /// Removes items from head to tail as the returned iterator is advanced.
    ///
    /// Items not consumed are dropped with the iterator.
    pub fn drain(&mut self) -> Drain<'_, T, CAP> {
        Drain { buf: self }
    }
}

impl<T> CircularBuffer<T> {
    /// Creates an empty buffer holding up to `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self::allocate(capacity)
    }
}

impl<T, const CAP: usize> Drop for CircularBuffer<T, CAP> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug, const CAP: usize> fmt::Debug for CircularBuffer<T, CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, const CAP: usize> IntoIterator for &'a CircularBuffer<T, CAP> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, CAP>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Head-to-tail iterator over a [`CircularBuffer`].
pub struct Iter<'a, T, const CAP: usize = 0> {
    buf: &'a CircularBuffer<T, CAP>,
    pos: usize,
}

impl<'a, T, const CAP: usize> Iterator for Iter<'a, T, CAP> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.buf.tail {
            return None;
        }
        // Safety: pos is in [head, tail).
        let item = unsafe { self.buf.slots[self.pos].assume_init_ref() };
        self.pos = self.buf.wrap_next(self.pos);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let slots = self.buf.slots.len();
        let remaining = (self.buf.tail + slots - self.pos) % slots;
        (remaining, Some(remaining))
    }
}

impl<T, const CAP: usize> ExactSizeIterator for Iter<'_, T, CAP> {}

/// Draining iterator returned by [`CircularBuffer::drain`].
pub struct Drain<'a, T, const CAP: usize = 0> {
    buf: &'a mut CircularBuffer<T, CAP>,
}

impl<T, const CAP: usize> Iterator for Drain<'_, T, CAP> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.buf.len();
        (len, Some(len))
    }
}

impl<T, const CAP: usize> DoubleEndedIterator for Drain<'_, T, CAP> {
    #[inline]
    fn next_back(&mut self) -> Option<T> {
        self.buf.pop_back()
    }
}

impl<T, const CAP: usize> ExactSizeIterator for Drain<'_, T, CAP> {}

impl<T, const CAP: usize> Drop for Drain<'_, T, CAP> {
    fn drop(&mut self) {
        self.buf.clear();
    }
}

//! A list backed by a private, batch-grown node pool.
//!
//! Nodes are slots in boxed batches of [`REPLENISH_NODES`]. A handle is the
//! slot's global index, so growing the pool never moves existing nodes. The
//! two sentinels live inline in the pool, outside the batches; an empty
//! list allocates nothing.
//!
//! Single owner: `LocalList` is `Send` when `T` is, but sharing one across
//! threads needs an external lock.

use std::fmt;
use std::marker::PhantomData;

use crate::{Corruption, Cursor, Direction, Forward, GenericLocalList, Link, NodeOps, Reverse};

/// Nodes added to the pool each time it runs dry.
pub const REPLENISH_NODES: usize = 8192;

/// Handle to a [`LocalList`] node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolRef(u32);

impl PoolRef {
    const HEAD: Self = PoolRef(u32::MAX - 1);
    const TAIL: Self = PoolRef(u32::MAX);
    // Indices at or above this are sentinels.
    const LIMIT: usize = u32::MAX as usize - 1;

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::HEAD => f.write_str("PoolRef(head)"),
            Self::TAIL => f.write_str("PoolRef(tail)"),
            PoolRef(i) => write!(f, "PoolRef({i})"),
        }
    }
}

struct Slot<T> {
    link: Link<PoolRef>,
    value: Option<T>,
}

impl<T> Slot<T> {
    fn vacant() -> Self {
        Self {
            link: Link {
                next: PoolRef::TAIL,
                prev: PoolRef::HEAD,
            },
            value: None,
        }
    }
}

pub(crate) struct NodePool<T> {
    sentinels: [Link<PoolRef>; 2],
    batches: Vec<Box<[Slot<T>]>>,
    free: Vec<PoolRef>,
}

impl<T> NodePool<T> {
    fn new() -> Self {
        let unlinked = Link {
            next: PoolRef::TAIL,
            prev: PoolRef::HEAD,
        };
        Self {
            sentinels: [unlinked; 2],
            batches: Vec::new(),
            free: Vec::new(),
        }
    }

    #[inline]
    fn slot(&self, node: PoolRef) -> &Slot<T> {
        let i = node.index();
        &self.batches[i / REPLENISH_NODES][i % REPLENISH_NODES]
    }

    #[inline]
    fn slot_mut(&mut self, node: PoolRef) -> &mut Slot<T> {
        let i = node.index();
        &mut self.batches[i / REPLENISH_NODES][i % REPLENISH_NODES]
    }

    fn capacity(&self) -> usize {
        self.batches.len() * REPLENISH_NODES
    }

    /// Builds a whole batch before making any of it allocatable.
    fn replenish(&mut self) -> bool {
        let base = self.capacity();
        if base + REPLENISH_NODES > PoolRef::LIMIT {
            return false;
        }
        let batch: Box<[Slot<T>]> = (0..REPLENISH_NODES).map(|_| Slot::vacant()).collect();
        self.batches.push(batch);
        // Reversed so nodes are handed out in index order.
        self.free
            .extend((base..base + REPLENISH_NODES).rev().map(|i| PoolRef(i as u32)));
        tracing::trace!(batches = self.batches.len(), nodes = self.capacity(), "node pool replenished");
        true
    }

    fn take(&mut self, node: PoolRef) -> Option<T> {
        self.slot_mut(node).value.take()
    }
}

pub(crate) struct PoolOps<T>(PhantomData<fn() -> T>);

impl<T> NodeOps for PoolOps<T> {
    type Ref = PoolRef;
    type State = NodePool<T>;

    #[inline]
    fn link(pool: &NodePool<T>, node: PoolRef) -> Link<PoolRef> {
        match node {
            PoolRef::HEAD => pool.sentinels[0],
            PoolRef::TAIL => pool.sentinels[1],
            _ => pool.slot(node).link,
        }
    }

    #[inline]
    fn set_link(pool: &mut NodePool<T>, node: PoolRef, link: Link<PoolRef>) {
        match node {
            PoolRef::HEAD => pool.sentinels[0] = link,
            PoolRef::TAIL => pool.sentinels[1] = link,
            _ => pool.slot_mut(node).link = link,
        }
    }

    fn allocate(pool: &mut NodePool<T>) -> Option<PoolRef> {
        if pool.free.is_empty() && !pool.replenish() {
            return None;
        }
        pool.free.pop()
    }

    fn free(pool: &mut NodePool<T>, node: PoolRef) {
        pool.slot_mut(node).value = None;
        pool.free.push(node);
    }
}

/// A doubly-linked list of `T` over a private node pool.
///
/// Supports O(1) push/pop at both ends and O(1) insert/erase at a cursor.
/// Cursors stay valid until their node is erased.
///
/// # Example
///
/// ```
/// use farmem_collections::LocalList;
///
/// let mut list = LocalList::new();
/// list.push_back(2);
/// list.push_front(1);
/// list.push_back(3);
/// assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
///
/// // Insert before the second element.
/// let second = list.next(list.begin());
/// list.insert(second, 10);
/// assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 10, 2, 3]);
///
/// assert_eq!(list.pop_back(), Some(3));
/// assert_eq!(list.len(), 3);
/// ```
pub struct LocalList<T> {
    pool: NodePool<T>,
    list: GenericLocalList<PoolOps<T>>,
    len: usize,
}

impl<T> LocalList<T> {
    /// Creates an empty list. Allocates nothing until the first push.
    pub fn new() -> Self {
        let mut pool = NodePool::new();
        let list = GenericLocalList::<PoolOps<T>>::new(&mut pool, PoolRef::HEAD, PoolRef::TAIL);
        Self { pool, list, len: 0 }
    }

    /// Number of elements, from a counter kept by insert and erase.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nodes the pool holds, used or free.
    pub fn pool_capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Cursor at the first element.
    #[inline]
    pub fn begin(&self) -> Cursor<PoolRef, Forward> {
        self.list.begin(&self.pool)
    }

    /// Cursor past the last element.
    #[inline]
    pub fn end(&self) -> Cursor<PoolRef, Forward> {
        self.list.end()
    }

    /// Reverse cursor at the last element.
    #[inline]
    pub fn rbegin(&self) -> Cursor<PoolRef, Reverse> {
        self.list.rbegin(&self.pool)
    }

    /// Reverse cursor before the first element.
    #[inline]
    pub fn rend(&self) -> Cursor<PoolRef, Reverse> {
        self.list.rend()
    }

    /// Steps `at` forward in its direction.
    #[inline]
    pub fn next<D: Direction>(&self, at: Cursor<PoolRef, D>) -> Cursor<PoolRef, D> {
        self.list.next(&self.pool, at)
    }

    /// Steps `at` backward in its direction.
    #[inline]
    pub fn prev<D: Direction>(&self, at: Cursor<PoolRef, D>) -> Cursor<PoolRef, D> {
        self.list.prev(&self.pool, at)
    }

    /// Inserts `value` before `at` (forward) or after it (reverse) and
    /// returns a cursor to it.
    ///
    /// # Panics
    ///
    /// Panics if the pool has run out of handles (about 4 billion nodes).
    pub fn insert<D: Direction>(&mut self, at: Cursor<PoolRef, D>, value: T) -> Cursor<PoolRef, D> {
        let Some(node) = self.list.insert(&mut self.pool, at) else {
            panic!("node pool exhausted");
        };
        self.pool.slot_mut(node.node()).value = Some(value);
        self.len += 1;
        node
    }

    /// Removes the element at `at`. Returns a cursor to the next element in
    /// `at`'s direction and the removed value.
    ///
    /// # Panics
    ///
    /// Panics if `at` is `end()` or `rend()`.
    pub fn erase<D: Direction>(&mut self, at: Cursor<PoolRef, D>) -> (Cursor<PoolRef, D>, T) {
        let (next, value) = self.list.erase(&mut self.pool, at, NodePool::take);
        self.len -= 1;
        match value {
            Some(value) => (next, value),
            None => unreachable!("linked node {at:?} holds no value"),
        }
    }

    /// Appends to the back.
    pub fn push_back(&mut self, value: T) {
        self.insert(self.end(), value);
    }

    /// Prepends to the front.
    pub fn push_front(&mut self, value: T) {
        self.insert(self.rend(), value);
    }

    /// Removes the first element.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        Some(self.erase(self.begin()).1)
    }

    /// Removes the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        Some(self.erase(self.rbegin()).1)
    }

    /// The element at `at`, or `None` at a sentinel.
    pub fn get<D: Direction>(&self, at: Cursor<PoolRef, D>) -> Option<&T> {
        if self.list.is_sentinel(at.node()) {
            return None;
        }
        self.pool.slot(at.node()).value.as_ref()
    }

    /// Mutable access to the element at `at`.
    pub fn get_mut<D: Direction>(&mut self, at: Cursor<PoolRef, D>) -> Option<&mut T> {
        if self.list.is_sentinel(at.node()) {
            return None;
        }
        self.pool.slot_mut(at.node()).value.as_mut()
    }

    /// First element.
    pub fn front(&self) -> Option<&T> {
        self.get(self.begin())
    }

    /// Last element.
    pub fn back(&self) -> Option<&T> {
        self.get(self.rbegin())
    }

    /// Mutable first element.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.get_mut(self.begin())
    }

    /// Mutable last element.
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.get_mut(self.rbegin())
    }

    /// Front-to-back iterator.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            pool: &self.pool,
            front: self.begin().node(),
            back: self.rbegin().node(),
            remaining: self.len,
        }
    }

    /// Removes every element. Pool memory is kept for reuse.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// Walks the list checking link symmetry and that the element count
    /// matches `len()`.
    ///
    /// # Errors
    ///
    /// Returns the first broken link. A count mismatch is reported as a
    /// corruption at the tail.
    pub fn validate(&self) -> Result<(), Corruption<PoolRef>> {
        let count = self.list.validate(&self.pool)?;
        if count != self.len {
            let tail = self.list.tail();
            let link = PoolOps::<T>::link(&self.pool, tail);
            return Err(Corruption {
                node: tail,
                next: link.next,
                back: link.prev,
            });
        }
        Ok(())
    }
}

impl<T> Default for LocalList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for LocalList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for LocalList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T> FromIterator<T> for LocalList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<'a, T> IntoIterator for &'a LocalList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`LocalList::iter`].
pub struct Iter<'a, T> {
    pool: &'a NodePool<T>,
    front: PoolRef,
    back: PoolRef,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.front;
        self.front = PoolOps::<T>::link(self.pool, node).next;
        self.remaining -= 1;
        self.pool.slot(node).value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.back;
        self.back = PoolOps::<T>::link(self.pool, node).prev;
        self.remaining -= 1;
        self.pool.slot(node).value.as_ref()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn collect(list: &LocalList<u32>) -> Vec<u32> {
        list.iter().copied().collect()
    }

    #[test]
    fn new_list_allocates_nothing() {
        let list: LocalList<u32> = LocalList::new();
        assert!(list.is_empty());
        assert_eq!(list.pool_capacity(), 0);
        assert_eq!(list.begin(), list.end());
        assert_eq!(list.rbegin(), list.rend());
        assert!(list.front().is_none());
        list.validate().unwrap();
    }

    #[test]
    fn push_pop_both_ends() {
        let mut list = LocalList::new();
        list.push_back(2);
        list.push_back(3);
        list.push_front(1);
        assert_eq!(collect(&list), [1, 2, 3]);
        assert_eq!(list.front(), Some(&1));
        assert_eq!(list.back(), Some(&3));

        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert_eq!(list.pop_front(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn push_back_then_pop_back_restores_back() {
        let mut list: LocalList<u32> = (0..5).collect();
        list.push_back(99);
        assert_eq!(list.pop_back(), Some(99));
        assert_eq!(list.len(), 5);
        assert_eq!(list.back(), Some(&4));
    }

    #[test]
    fn reverse_cursor_insert_goes_after() {
        let mut list: LocalList<u32> = [1, 3].into_iter().collect();
        let last = list.rbegin();
        let first = list.next(last);
        list.insert(first, 2);
        assert_eq!(collect(&list), [1, 2, 3]);
        list.validate().unwrap();
    }

    #[test]
    fn erase_middle_returns_next() {
        let mut list: LocalList<u32> = (0..4).collect();
        let at = list.next(list.begin());
        let (next, removed) = list.erase(at);
        assert_eq!(removed, 1);
        assert_eq!(list.get(next), Some(&2));

        let (prev, removed) = list.erase(list.rbegin());
        assert_eq!(removed, 3);
        assert_eq!(list.get(prev), Some(&2));
        assert_eq!(collect(&list), [0, 2]);
    }

    #[test]
    fn erase_all_empties() {
        let mut list: LocalList<u32> = (0..100).collect();
        let mut at = list.begin();
        while at != list.end() {
            at = list.erase(at).0;
        }
        assert!(list.is_empty());
        assert_eq!(list.begin(), list.end());
        list.validate().unwrap();
    }

    #[test]
    fn grows_in_batches_and_reuses_nodes() {
        let mut list = LocalList::new();
        list.push_back(0u32);
        assert_eq!(list.pool_capacity(), REPLENISH_NODES);

        for i in 1..=REPLENISH_NODES as u32 {
            list.push_back(i);
        }
        assert_eq!(list.pool_capacity(), 2 * REPLENISH_NODES);

        list.clear();
        for i in 0..2 * REPLENISH_NODES as u32 {
            list.push_front(i);
        }
        assert_eq!(list.pool_capacity(), 2 * REPLENISH_NODES);
        assert_eq!(list.len(), 2 * REPLENISH_NODES);
        list.validate().unwrap();
    }

    #[test]
    fn iter_is_double_ended() {
        let list: LocalList<u32> = (0..6).collect();
        let mut it = list.iter();
        assert_eq!(it.next(), Some(&0));
        assert_eq!(it.next_back(), Some(&5));
        assert_eq!(it.len(), 4);
        assert_eq!(it.rev().copied().collect::<Vec<_>>(), [4, 3, 2, 1]);
    }

    #[test]
    fn front_back_mut() {
        let mut list: LocalList<u32> = (1..=3).collect();
        *list.front_mut().unwrap() = 10;
        *list.back_mut().unwrap() = 30;
        assert_eq!(collect(&list), [10, 2, 30]);
    }

    #[test]
    fn get_at_sentinel_is_none() {
        let list: LocalList<u32> = (0..2).collect();
        assert!(list.get(list.end()).is_none());
        assert!(list.get(list.rend()).is_none());
    }

    #[test]
    fn values_dropped_on_erase_and_drop() {
        let tracker = Rc::new(());
        let mut list = LocalList::new();
        for _ in 0..10 {
            list.push_back(Rc::clone(&tracker));
        }
        assert_eq!(Rc::strong_count(&tracker), 11);
        drop(list.pop_front());
        assert_eq!(Rc::strong_count(&tracker), 10);
        drop(list);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn debug_lists_values() {
        let list: LocalList<u32> = (1..=2).collect();
        assert_eq!(format!("{list:?}"), "[1, 2]");
        assert_eq!(format!("{:?}", list.end().node()), "PoolRef(tail)");
    }
}

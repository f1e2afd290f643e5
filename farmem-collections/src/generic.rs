//! The list algorithm, independent of where nodes live.
//!
//! # Shape
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────┐
//!   v                                                      │ prev
//! head ⇄ n0 ⇄ n1 ⇄ ... ⇄ nk ⇄ tail                         │
//!   │ prev                                                 ^
//!   └──────────────────────────────────────────────────────┘
//! ```
//!
//! Two sentinels close the ring, so every real node has real neighbors and
//! insert/erase never branch on "first" or "last". An empty list has
//! `head.next == tail` and `tail.prev == head`.
//!
//! # Symmetry
//!
//! For every node `n`, `link(link(n).next).prev == n`. Mutating operations
//! check the neighbors they touch with `debug_assert!`; [`validate`] walks
//! the whole list and reports the first violation.
//!
//! [`validate`]: GenericLocalList::validate

use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

use crate::{Cursor, Direction, Forward, Link, NodeOps, Reverse};

/// A broken link found by [`GenericLocalList::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("list corrupted: {node:?}.next = {next:?} but {next:?}.prev = {back:?}")]
pub struct Corruption<R: fmt::Debug> {
    /// Node whose `next` link was followed.
    pub node: R,
    /// Where `node.next` points.
    pub next: R,
    /// Where `next.prev` points instead of back to `node`.
    pub back: R,
}

/// A doubly-linked list whose nodes live in the node space `O`.
///
/// The list itself holds only the two sentinel handles. Every operation
/// takes the node space's state, which must be the same instance for the
/// lifetime of the list (the list cannot check this).
pub struct GenericLocalList<O: NodeOps> {
    head: O::Ref,
    tail: O::Ref,
    _ops: PhantomData<fn() -> O>,
}

impl<O: NodeOps> GenericLocalList<O> {
    /// Creates an empty list, linking the `head` and `tail` sentinel nodes
    /// to each other.
    pub fn new(state: &mut O::State, head: O::Ref, tail: O::Ref) -> Self {
        O::set_link(state, head, Link { next: tail, prev: tail });
        O::set_link(state, tail, Link { next: head, prev: head });
        Self::attach(head, tail)
    }

    /// Reopens a list whose sentinels were already linked, e.g. one
    /// persisted in a region buffer.
    pub fn attach(head: O::Ref, tail: O::Ref) -> Self {
        Self {
            head,
            tail,
            _ops: PhantomData,
        }
    }

    /// Head sentinel handle.
    #[inline]
    pub fn head(&self) -> O::Ref {
        self.head
    }

    /// Tail sentinel handle.
    #[inline]
    pub fn tail(&self) -> O::Ref {
        self.tail
    }

    /// Returns `true` for either sentinel.
    #[inline]
    pub fn is_sentinel(&self, node: O::Ref) -> bool {
        node == self.head || node == self.tail
    }

    /// Returns `true` if no real node is linked.
    #[inline]
    pub fn is_empty(&self, state: &O::State) -> bool {
        O::link(state, self.head).next == self.tail
    }

    /// First node, or [`end`](Self::end) if empty.
    #[inline]
    pub fn begin(&self, state: &O::State) -> Cursor<O::Ref, Forward> {
        Cursor::new(O::link(state, self.head).next)
    }

    /// One past the last node (the tail sentinel).
    #[inline]
    pub fn end(&self) -> Cursor<O::Ref, Forward> {
        Cursor::new(self.tail)
    }

    /// Last node, or [`rend`](Self::rend) if empty.
    #[inline]
    pub fn rbegin(&self, state: &O::State) -> Cursor<O::Ref, Reverse> {
        Cursor::new(O::link(state, self.tail).prev)
    }

    /// One before the first node (the head sentinel).
    #[inline]
    pub fn rend(&self) -> Cursor<O::Ref, Reverse> {
        Cursor::new(self.head)
    }

    /// Advances `at` one node in its direction.
    #[inline]
    pub fn next<D: Direction>(&self, state: &O::State, at: Cursor<O::Ref, D>) -> Cursor<O::Ref, D> {
        Cursor::new(D::ahead(O::link(state, at.node())))
    }

    /// Moves `at` one node against its direction.
    #[inline]
    pub fn prev<D: Direction>(&self, state: &O::State, at: Cursor<O::Ref, D>) -> Cursor<O::Ref, D> {
        Cursor::new(D::behind(O::link(state, at.node())))
    }

    /// Allocates a node and links it just before `at` in traversal order:
    /// before `at` for a forward cursor, after it for a reverse one.
    ///
    /// Returns a cursor to the new node, whose payload is left for the
    /// caller to fill, or `None` if the node space is exhausted.
    ///
    /// # Panics
    ///
    /// Panics if `at` is the sentinel a traversal starts from (the head for
    /// a forward cursor, the tail for a reverse one), since the new node
    /// would land outside the sentinels.
    pub fn insert<D: Direction>(
        &self,
        state: &mut O::State,
        at: Cursor<O::Ref, D>,
    ) -> Option<Cursor<O::Ref, D>> {
        let ahead = at.node();
        let behind = D::behind(O::link(state, ahead));
        let (prev, next) = D::orient(behind, ahead);
        assert!(
            !(prev == self.tail && next == self.head),
            "cannot insert outside the sentinels"
        );
        let node = O::allocate(state)?;
        self.link_between(state, node, prev, next);
        Some(Cursor::new(node))
    }

    /// Unlinks the node at `at`, lets `before_free` take its payload, then
    /// frees the node.
    ///
    /// Returns a cursor to the following node in `at`'s direction, plus
    /// whatever `before_free` returned.
    ///
    /// # Panics
    ///
    /// Panics if `at` is a sentinel.
    pub fn erase<D, V, F>(
        &self,
        state: &mut O::State,
        at: Cursor<O::Ref, D>,
        before_free: F,
    ) -> (Cursor<O::Ref, D>, V)
    where
        D: Direction,
        F: FnOnce(&mut O::State, O::Ref) -> V,
    {
        let node = at.node();
        assert!(!self.is_sentinel(node), "cannot erase a sentinel node");
        let link = self.unlink(state, node);
        let value = before_free(state, node);
        O::free(state, node);
        (Cursor::new(D::ahead(link)), value)
    }

    fn link_between(&self, state: &mut O::State, node: O::Ref, prev: O::Ref, next: O::Ref) {
        let mut prev_link = O::link(state, prev);
        let mut next_link = O::link(state, next);
        debug_assert_eq!(prev_link.next, next, "asymmetric neighbors at insert");
        debug_assert_eq!(next_link.prev, prev, "asymmetric neighbors at insert");

        O::set_link(state, node, Link { next, prev });
        prev_link.next = node;
        O::set_link(state, prev, prev_link);
        next_link.prev = node;
        O::set_link(state, next, next_link);
    }

    fn unlink(&self, state: &mut O::State, node: O::Ref) -> Link<O::Ref> {
        let link = O::link(state, node);
        let mut prev_link = O::link(state, link.prev);
        debug_assert_eq!(prev_link.next, node, "asymmetric neighbors at erase");
        prev_link.next = link.next;
        O::set_link(state, link.prev, prev_link);

        let mut next_link = O::link(state, link.next);
        debug_assert_eq!(next_link.prev, node, "asymmetric neighbors at erase");
        next_link.prev = link.prev;
        O::set_link(state, link.next, next_link);
        link
    }

    /// Iterates node handles from head to tail, sentinels excluded.
    pub fn nodes<'a>(&self, state: &'a O::State) -> Nodes<'a, O> {
        Nodes {
            state,
            cur: O::link(state, self.head).next,
            tail: self.tail,
        }
    }

    /// Walks the whole ring checking link symmetry.
    ///
    /// Returns the number of real nodes.
    ///
    /// # Errors
    ///
    /// Returns the first [`Corruption`] found, including a walk that comes
    /// back to the head without reaching the tail.
    pub fn validate(&self, state: &O::State) -> Result<usize, Corruption<O::Ref>> {
        let mut node = self.head;
        let mut count = 0usize;
        loop {
            let next = O::link(state, node).next;
            let back = O::link(state, next).prev;
            if back != node || next == self.head {
                return Err(Corruption { node, next, back });
            }
            if next == self.tail {
                break;
            }
            count += 1;
            node = next;
        }
        let tail_next = O::link(state, self.tail).next;
        if tail_next != self.head {
            return Err(Corruption {
                node: self.tail,
                next: tail_next,
                back: O::link(state, tail_next).prev,
            });
        }
        Ok(count)
    }
}

impl<O: NodeOps> fmt::Debug for GenericLocalList<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericLocalList")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

/// Iterator over node handles returned by [`GenericLocalList::nodes`].
pub struct Nodes<'a, O: NodeOps> {
    state: &'a O::State,
    cur: O::Ref,
    tail: O::Ref,
}

impl<O: NodeOps> Iterator for Nodes<'_, O> {
    type Item = O::Ref;

    fn next(&mut self) -> Option<O::Ref> {
        if self.cur == self.tail {
            return None;
        }
        let node = self.cur;
        self.cur = O::link(self.state, node).next;
        Some(node)
    }
}

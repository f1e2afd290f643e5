//! Node handles, links, and the operations a node space provides.

use std::fmt;
use std::marker::PhantomData;

/// Opaque handle to a list node.
///
/// Not assumed to be a pointer: a pool index, an offset inside a chunk, or
/// anything else the node space can resolve.
pub trait NodeRef: Copy + Eq + fmt::Debug {}

impl<T: Copy + Eq + fmt::Debug> NodeRef for T {}

/// The `next`/`prev` pair stored in every node, sentinels included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link<R> {
    /// Following node (towards the tail sentinel).
    pub next: R,
    /// Preceding node (towards the head sentinel).
    pub prev: R,
}

/// A space that stores list nodes.
///
/// The list algorithm in [`GenericLocalList`](crate::GenericLocalList) only
/// touches nodes through these four operations, so the same code runs over
/// a private pool or over nodes laid out in a region buffer. Any context
/// the space needs (the pool, the chunk bytes) is the [`State`](NodeOps::State)
/// passed to every call; stateless spaces use `()`.
pub trait NodeOps {
    /// Handle type.
    type Ref: NodeRef;

    /// Context passed to every operation.
    type State: ?Sized;

    /// Reads the links of `node`.
    fn link(state: &Self::State, node: Self::Ref) -> Link<Self::Ref>;

    /// Overwrites the links of `node`.
    fn set_link(state: &mut Self::State, node: Self::Ref, link: Link<Self::Ref>);

    /// Hands out an unused node, or `None` if the space is exhausted. The
    /// node's payload is left for the caller to fill.
    fn allocate(state: &mut Self::State) -> Option<Self::Ref>;

    /// Returns `node` to the space.
    fn free(state: &mut Self::State, node: Self::Ref);
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Forward {}
    impl Sealed for super::Reverse {}
}

/// Traversal direction of a [`Cursor`].
///
/// Both directions share one walk; a direction only decides which link
/// counts as "ahead".
pub trait Direction: sealed::Sealed + 'static {
    /// Link followed when advancing.
    fn ahead<R>(link: Link<R>) -> R;

    /// Link followed when stepping back.
    fn behind<R>(link: Link<R>) -> R;

    /// Orders a `(behind, ahead)` pair of traversal neighbors as
    /// `(prev, next)`.
    fn orient<R>(behind: R, ahead: R) -> (R, R);
}

/// Head-to-tail traversal. Inserting at a forward cursor places the new
/// node before it.
#[derive(Debug)]
pub enum Forward {}

/// Tail-to-head traversal. Inserting at a reverse cursor places the new
/// node after it.
#[derive(Debug)]
pub enum Reverse {}

impl Direction for Forward {
    #[inline]
    fn ahead<R>(link: Link<R>) -> R {
        link.next
    }

    #[inline]
    fn behind<R>(link: Link<R>) -> R {
        link.prev
    }

    #[inline]
    fn orient<R>(behind: R, ahead: R) -> (R, R) {
        (behind, ahead)
    }
}

impl Direction for Reverse {
    #[inline]
    fn ahead<R>(link: Link<R>) -> R {
        link.prev
    }

    #[inline]
    fn behind<R>(link: Link<R>) -> R {
        link.next
    }

    #[inline]
    fn orient<R>(behind: R, ahead: R) -> (R, R) {
        (ahead, behind)
    }
}

/// A position in a list: a node handle plus a traversal direction.
///
/// Cursors are plain values. Moving one needs the node space, so it is
/// done through the list (`next`/`prev`). Equality compares handles only.
pub struct Cursor<R, D> {
    node: R,
    _dir: PhantomData<D>,
}

impl<R: NodeRef, D: Direction> Cursor<R, D> {
    #[inline]
    pub(crate) fn new(node: R) -> Self {
        Self {
            node,
            _dir: PhantomData,
        }
    }

    /// The node this cursor refers to.
    #[inline]
    pub fn node(&self) -> R {
        self.node
    }
}

impl<R: Copy, D> Clone for Cursor<R, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Copy, D> Copy for Cursor<R, D> {}

impl<R: PartialEq, D> PartialEq for Cursor<R, D> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<R: Eq, D> Eq for Cursor<R, D> {}

impl<R: fmt::Debug, D> fmt::Debug for Cursor<R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.node).finish()
    }
}

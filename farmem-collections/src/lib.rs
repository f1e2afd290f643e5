//! Doubly-linked lists whose nodes live wherever the caller keeps them.
//!
//! Far-memory data structures cannot assume that a node is a heap pointer:
//! a node may sit in a pool owned by the list, or inside an object in a
//! region buffer that is later copied to remote memory. This crate separates
//! the list algorithm from node storage:
//!
//! ```text
//! GenericLocalList<O>  - sentinels + insert/erase/traverse, no storage
//! O: NodeOps           - link, set_link, allocate, free over O::State
//! ```
//!
//! Two node spaces ship with the crate:
//!
//! - [`LocalList`] owns a pool of nodes that grows in batches of
//!   [`REPLENISH_NODES`] and never shrinks.
//! - [`ChunkList`] lays a bounded list out in a caller-provided byte slice,
//!   with `u16` links, so it can live inside a region object.
//!
//! # Cursors
//!
//! A [`Cursor`] is a node handle tagged with a direction ([`Forward`] or
//! [`Reverse`]). Inserting at a forward cursor places the new node before
//! it; at a reverse cursor, after it. `end()` and `rend()` are the tail and
//! head sentinels.
//!
//! ```
//! use farmem_collections::LocalList;
//!
//! let mut list: LocalList<u32> = [1, 3].into_iter().collect();
//! let three = list.next(list.begin());
//! list.insert(three, 2);
//! list.insert(list.rend(), 0);
//! assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3]);
//!
//! let (after, removed) = list.erase(list.begin());
//! assert_eq!(removed, 0);
//! assert_eq!(list.get(after), Some(&1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod chunk;
mod generic;
mod local;
mod node;

pub use chunk::{CHUNK_HEADER_SIZE, ChunkList, ChunkNodes, MAX_CHUNK_NODES};
pub use generic::{Corruption, GenericLocalList, Nodes};
pub use local::{Iter, LocalList, PoolRef, REPLENISH_NODES};
pub use node::{Cursor, Direction, Forward, Link, NodeOps, NodeRef, Reverse};

//! # farmem-queue
//!
//! Bounded ring buffers used to hand work between the far-memory runtime's
//! GC and prefetch threads.
//!
//! ## Features
//!
//! - **`CircularBuffer`**: single-owner ring buffer, fixed (const generic) or
//!   dynamic (runtime) capacity, push/pop at both ends
//! - **`SyncCircularBuffer`**: the same buffer behind a spin lock, shareable
//!   across threads
//! - **Work stealing**: move half of a peer's pending items in one operation
//! - **Overwrite-on-full**: `push_back_override` evicts the oldest item
//!   instead of failing
//!
//! ## Design Goals
//!
//! - No allocations after construction
//! - Fullness decided by slot indices alone (`capacity + 1` physical slots)
//! - Full and empty are recoverable outcomes, never panics
//!
//! ## Example
//!
//! ```
//! use farmem_queue::CircularBuffer;
//!
//! let mut buf: CircularBuffer<u64> = CircularBuffer::with_capacity(2);
//!
//! buf.push_back(1).unwrap();
//! buf.push_back(2).unwrap();
//! assert!(buf.push_back(3).is_err());
//!
//! // Evict the oldest item to make room.
//! assert_eq!(buf.push_back_override(3), Some(1));
//! assert_eq!(buf.pop_front(), Some(2));
//! assert_eq!(buf.pop_front(), Some(3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod circular;
mod spin;
mod sync;

pub use circular::{CircularBuffer, Drain, Full, Iter};
pub use spin::{SpinMutex, SpinMutexGuard};
pub use sync::SyncCircularBuffer;

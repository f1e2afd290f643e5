//! # farmem-gc
//!
//! Reclaims region space. A [`Collector`] turns every local region's GC
//! boundary ranges into [`SweepTask`]s, fans them out over a
//! [`Parallelizer`](farmem_parallel::Parallelizer), and lets each sweeping
//! thread walk its range:
//!
//! ```text
//! region 0: [HEADER_SIZE ─── b0) [b0 ─── b1)     -> 2 tasks
//! region 1: [HEADER_SIZE ─── cursor)             -> 1 task
//!                 │                   │
//!                 v                   v
//!             gc thread 0         gc thread 1    (work stealing)
//! ```
//!
//! A range never splits an object, so two threads never touch the same
//! header. Dead objects are flipped to free and drop one reference each;
//! once a region's count reaches zero [`Collector::collect`] resets it.
//!
//! Deciding what is dead is the caller's job, through [`Liveness`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod collector;

pub use builder::CollectorBuilder;
pub use collector::{Collector, Liveness, SweepStats, SweepTask};
pub use farmem_parallel::{ConfigError, ParallelError};

//! A master/slave task dispatcher built on [`farmem_queue`]'s spin-locked
//! ring buffers.
//!
//! One master thread produces tasks; `N` slave threads consume them. Each
//! slave owns a bounded queue. The master places tasks round-robin, moving
//! on to the next queue when one is full. A slave whose queue runs dry
//! steals half of a peer's pending tasks before giving up.
//!
//! ```text
//!              master_enqueue_task (round-robin, retry on full)
//!                 │            │            │
//!                 v            v            v
//!            ┌─────────┐  ┌─────────┐  ┌─────────┐
//!            │ queue 0 │  │ queue 1 │  │ queue 2 │   SyncCircularBuffer
//!            └────┬────┘  └────┬────┘  └────┬────┘
//!                 │  <── work_steal ──>     │
//!                 v            v            v
//!              slave 0      slave 1      slave 2
//! ```
//!
//! # Termination
//!
//! Shutdown is cooperative. The master sets `master_done` after its producer
//! logic returns. A slave exits only once it observes `master_done` *and*
//! finds every queue empty, so a task enqueued just before shutdown is still
//! delivered. Every enqueued task is dequeued by exactly one slave.
//!
//! If every slave has panicked, the master stops blocking on full queues:
//! `master_enqueue_task` drops the task and returns `false`. Leftover tasks
//! are cleared when the next `execute` starts.
//!
//! # Example
//!
//! ```
//! use farmem_parallel::{Job, Parallelizer};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct SumJob {
//!     total: AtomicU64,
//! }
//!
//! impl Job<u64> for SumJob {
//!     fn master(&self, p: &Parallelizer<u64>) {
//!         for i in 1..=100 {
//!             p.master_enqueue_task(i);
//!         }
//!     }
//!
//!     fn slave(&self, tid: usize, p: &Parallelizer<u64>) -> bool {
//!         match p.slave_dequeue_task(tid) {
//!             Some(x) => {
//!                 self.total.fetch_add(x, Ordering::Relaxed);
//!                 true
//!             }
//!             None => false,
//!         }
//!     }
//! }
//!
//! let mut p = Parallelizer::new(2, 8);
//! let job = SumJob { total: AtomicU64::new(0) };
//! p.execute(&job).unwrap();
//! assert_eq!(job.total.load(Ordering::Relaxed), 5050);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod error;
mod parallelizer;

pub use builder::ParallelizerBuilder;
pub use error::{ConfigError, ParallelError};
pub use parallelizer::{Job, Parallelizer, SlaveStatus};

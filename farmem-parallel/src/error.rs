//! Error types for dispatcher configuration and execution.

use std::io;

use thiserror::Error;

/// Invalid dispatcher configuration, reported by `build()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// At least one slave thread is required.
    #[error("number of slaves must be > 0")]
    ZeroSlaves,
    /// Task queues must hold at least one task.
    #[error("task queue depth must be > 0")]
    ZeroQueueDepth,
}

/// Failure while running a [`Job`](crate::Job).
///
/// Per-task failures are the job's own business; the dispatcher only
/// reports problems with the threads it manages.
#[derive(Debug, Error)]
pub enum ParallelError {
    /// The OS refused to start a slave thread.
    #[error("failed to spawn slave thread {tid}")]
    Spawn {
        /// Index of the slave that could not be started.
        tid: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A slave's `slave` callback panicked. Tasks left in its queue are
    /// stolen by the remaining slaves, if any.
    #[error("slave thread {tid} panicked")]
    SlavePanicked {
        /// Index of the slave that panicked.
        tid: usize,
    },
}

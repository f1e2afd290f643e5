//! Collector configuration.

use farmem_parallel::{ConfigError, ParallelizerBuilder};
use farmem_region::GC_PARALLELISM;

use crate::{Collector, SweepTask};

const DEFAULT_QUEUE_DEPTH: usize = 256;
const THREAD_NAME: &str = "farmem-gc";

/// Builder for [`Collector`].
///
/// # Example
///
/// ```
/// use farmem_gc::CollectorBuilder;
///
/// let gc = CollectorBuilder::default()
///     .gc_threads(4)
///     .queue_depth(32)
///     .build()
///     .unwrap();
/// assert_eq!(gc.gc_threads(), 4);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CollectorBuilder {
    gc_threads: usize,
    queue_depth: usize,
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self {
            gc_threads: GC_PARALLELISM,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl CollectorBuilder {
    /// Number of sweeping threads. Default: [`GC_PARALLELISM`], one per
    /// boundary range of a sealed region.
    pub fn gc_threads(mut self, n: usize) -> Self {
        self.gc_threads = n;
        self
    }

    /// Sweep tasks each thread may have queued. Default: 256.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the thread count or queue depth is zero.
    pub fn build(self) -> Result<Collector, ConfigError> {
        let parallelizer = ParallelizerBuilder::default()
            .num_slaves(self.gc_threads)
            .queue_depth(self.queue_depth)
            .thread_name(THREAD_NAME)
            .build::<SweepTask>()?;
        Ok(Collector::with_parallelizer(parallelizer))
    }
}

//! Dispatcher configuration.

use crate::{ConfigError, Parallelizer};

const DEFAULT_QUEUE_DEPTH: usize = 1024;
const DEFAULT_THREAD_NAME: &str = "farmem-slave";

/// Builder for [`Parallelizer`].
///
/// # Example
///
/// ```
/// use farmem_parallel::ParallelizerBuilder;
///
/// let p = ParallelizerBuilder::default()
///     .num_slaves(4)
///     .queue_depth(16)
///     .thread_name("gc")
///     .build::<u64>()
///     .unwrap();
///
/// assert_eq!(p.num_slaves(), 4);
/// assert_eq!(p.queue_depth(), 16);
/// ```
#[derive(Clone, Debug)]
pub struct ParallelizerBuilder {
    num_slaves: usize,
    queue_depth: usize,
    thread_name: String,
}

impl Default for ParallelizerBuilder {
    fn default() -> Self {
        Self {
            num_slaves: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl ParallelizerBuilder {
    /// Number of slave threads (and per-slave queues).
    /// Default: available parallelism.
    pub fn num_slaves(mut self, n: usize) -> Self {
        self.num_slaves = n;
        self
    }

    /// Capacity of each slave's task queue. Default: 1024.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Prefix for slave thread names; slave `i` is named `{prefix}-{i}`.
    /// Default: `farmem-slave`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Validates the configuration and allocates the queues.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the slave count or queue depth is zero.
    pub fn build<T>(self) -> Result<Parallelizer<T>, ConfigError> {
        if self.num_slaves == 0 {
            return Err(ConfigError::ZeroSlaves);
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        Ok(Parallelizer::with_config(
            self.num_slaves,
            self.queue_depth,
            self.thread_name,
        ))
    }
}

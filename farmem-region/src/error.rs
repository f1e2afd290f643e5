use std::io;

use thiserror::Error;

/// Failure to set up a region's backing buffer.
///
/// Allocation inside a region never fails with an error: a full region
/// returns `None` from [`Region::allocate_object`](crate::Region::allocate_object).
#[derive(Debug, Error)]
pub enum RegionError {
    /// The OS refused to map the buffer.
    #[error("failed to map region buffer")]
    Alloc(#[source] io::Error),
    /// Huge pages were requested but none could be reserved.
    #[error("huge pages unavailable for region buffer")]
    HugePages(#[source] io::Error),
    /// `mlock` failed, typically because `RLIMIT_MEMLOCK` is too low.
    #[error("failed to lock region buffer in memory")]
    Mlock(#[source] io::Error),
}

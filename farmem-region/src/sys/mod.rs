//! Region backing buffers allocated directly from the OS.

#[cfg(any(not(unix), miri))]
mod alloc;

#[cfg(all(unix, not(miri)))]
mod unix;

use std::fmt;
use std::ptr::NonNull;

#[cfg(any(not(unix), miri))]
use alloc::{alloc_huge, alloc_region, free_region, mlock_region};

#[cfg(all(unix, not(miri)))]
use unix::{alloc_huge, alloc_region, free_region, mlock_region};

use crate::{REGION_SIZE, RegionError};

/// An owned, zeroed, `REGION_SIZE`-byte buffer aligned to `REGION_SIZE`.
///
/// The alignment is what lets [`Region::inc_ref_cnt_at`](crate::Region::inc_ref_cnt_at)
/// find a region header from any object address inside it. Memory is
/// returned to the OS on drop.
pub struct RegionBuf {
    ptr: NonNull<u8>,
    map_len: usize,
    locked: bool,
}

// Safety: the buffer is plain memory; all shared access goes through
// `Region`, which only mutates it atomically through `&self`.
unsafe impl Send for RegionBuf {}
unsafe impl Sync for RegionBuf {}

impl RegionBuf {
    /// Maps a buffer with default settings (regular pages, not locked).
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Alloc`] if the OS refuses the mapping.
    pub fn new() -> Result<Self, RegionError> {
        RegionBufBuilder::default().build()
    }

    /// Returns a builder for huge-page or locked buffers.
    pub fn builder() -> RegionBufBuilder {
        RegionBufBuilder::default()
    }

    /// Start of the buffer.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Whether the buffer was pinned with `mlock`.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Zeroes `REGION_SIZE - from` bytes starting at `from`.
    pub(crate) fn zero_from(&mut self, from: usize) {
        debug_assert!(from <= REGION_SIZE);
        // Safety: [from, REGION_SIZE) is inside the buffer and `&mut self`
        // rules out concurrent access.
        unsafe { std::ptr::write_bytes(self.ptr.as_ptr().add(from), 0, REGION_SIZE - from) };
    }
}

impl Drop for RegionBuf {
    fn drop(&mut self) {
        // Safety: ptr and map_len came from the matching allocator.
        unsafe { free_region(self.ptr, self.map_len) }
    }
}

impl fmt::Debug for RegionBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionBuf")
            .field("ptr", &self.ptr)
            .field("locked", &self.locked)
            .finish()
    }
}

/// Builder for [`RegionBuf`].
///
/// # Example
///
/// ```
/// use farmem_region::{RegionBuf, REGION_SIZE};
///
/// let buf = RegionBuf::builder().build().unwrap();
/// assert_eq!(buf.as_ptr() as usize % REGION_SIZE, 0);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RegionBufBuilder {
    huge_pages: bool,
    mlock: bool,
}

impl RegionBufBuilder {
    /// Back the buffer with a reserved huge page (Linux `MAP_HUGETLB`).
    /// Default: false.
    pub fn huge_pages(mut self, enabled: bool) -> Self {
        self.huge_pages = enabled;
        self
    }

    /// Pin the buffer in RAM. Default: false.
    pub fn mlock(mut self, enabled: bool) -> Self {
        self.mlock = enabled;
        self
    }

    /// Maps the buffer.
    ///
    /// # Errors
    ///
    /// - [`RegionError::Alloc`] if the mapping fails
    /// - [`RegionError::HugePages`] if huge pages were requested but none
    ///   are available
    /// - [`RegionError::Mlock`] if the buffer could not be locked
    pub fn build(self) -> Result<RegionBuf, RegionError> {
        let (ptr, map_len) = if self.huge_pages {
            alloc_huge().map_err(RegionError::HugePages)?
        } else {
            alloc_region().map_err(RegionError::Alloc)?
        };
        debug_assert_eq!(ptr.as_ptr().addr() % REGION_SIZE, 0);

        let mut buf = RegionBuf {
            ptr,
            map_len,
            locked: false,
        };
        if self.mlock {
            // On error `buf` drops and unmaps.
            mlock_region(buf.ptr, REGION_SIZE).map_err(RegionError::Mlock)?;
            buf.locked = true;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_region_aligned() {
        let buf = RegionBuf::new().unwrap();
        assert_eq!(buf.as_ptr() as usize % REGION_SIZE, 0);
    }

    #[test]
    fn buffer_starts_zeroed_and_is_writable() {
        let buf = RegionBuf::new().unwrap();
        unsafe {
            assert_eq!(*buf.as_ptr(), 0);
            assert_eq!(*buf.as_ptr().add(REGION_SIZE - 1), 0);
            std::ptr::write_bytes(buf.as_ptr(), 0xAB, REGION_SIZE);
            assert_eq!(*buf.as_ptr().add(REGION_SIZE - 1), 0xAB);
        }
    }

    #[test]
    fn zero_from_clears_tail_only() {
        let mut buf = RegionBuf::new().unwrap();
        unsafe { std::ptr::write_bytes(buf.as_ptr(), 0xCD, REGION_SIZE) };
        buf.zero_from(6);
        unsafe {
            assert_eq!(*buf.as_ptr().add(5), 0xCD);
            assert_eq!(*buf.as_ptr().add(6), 0);
            assert_eq!(*buf.as_ptr().add(REGION_SIZE - 1), 0);
        }
    }

    #[test]
    fn distinct_buffers() {
        let bufs: Vec<_> = (0..8).map(|_| RegionBuf::new().unwrap()).collect();
        for i in 0..bufs.len() {
            for j in (i + 1)..bufs.len() {
                assert_ne!(bufs[i].as_ptr(), bufs[j].as_ptr());
            }
        }
    }

    #[test]
    fn mlock_reports_result() {
        match RegionBuf::builder().mlock(true).build() {
            Ok(buf) => assert!(buf.is_locked()),
            Err(e) => assert!(matches!(e, RegionError::Mlock(_))),
        }
    }

    #[test]
    fn huge_pages_reports_result() {
        match RegionBuf::builder().huge_pages(true).build() {
            Ok(buf) => assert_eq!(buf.as_ptr() as usize % REGION_SIZE, 0),
            Err(e) => assert!(matches!(e, RegionError::HugePages(_))),
        }
    }
}

//! Fallback implementation using std::alloc.

use std::alloc::Layout;
use std::io;
use std::ptr::NonNull;

use crate::REGION_SIZE;

fn layout() -> io::Result<Layout> {
    Layout::from_size_align(REGION_SIZE, REGION_SIZE)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

pub(super) fn alloc_region() -> io::Result<(NonNull<u8>, usize)> {
    let ptr = unsafe { std::alloc::alloc_zeroed(layout()?) };
    let ptr = NonNull::new(ptr)
        .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "allocation failed"))?;
    Ok((ptr, REGION_SIZE))
}

pub(super) fn alloc_huge() -> io::Result<(NonNull<u8>, usize)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "huge pages are not supported on this platform",
    ))
}

pub(super) fn mlock_region(_ptr: NonNull<u8>, _len: usize) -> io::Result<()> {
    Ok(())
}

/// # Safety
/// `ptr` must come from `alloc_region`.
pub(super) unsafe fn free_region(ptr: NonNull<u8>, _map_len: usize) {
    if let Ok(layout) = layout() {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

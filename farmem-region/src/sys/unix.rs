//! Unix implementation using mmap.

use std::io;
use std::ptr::{self, NonNull};

use crate::{HUGE_PAGE_SIZE, REGION_SIZE};

fn page_size() -> usize {
    static PAGE_SIZE: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 { size as usize } else { 4096 }
    })
}

fn map(len: usize, flags: libc::c_int) -> io::Result<NonNull<u8>> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            flags,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned null"))
}

fn prefault(ptr: NonNull<u8>, len: usize) {
    for offset in (0..len).step_by(page_size()) {
        unsafe { ptr::write_volatile(ptr.as_ptr().add(offset), 0) };
    }
}

/// Maps twice the region size and trims both ends so what remains is one
/// `REGION_SIZE`-aligned region.
pub(super) fn alloc_region() -> io::Result<(NonNull<u8>, usize)> {
    let map_len = REGION_SIZE * 2;
    let raw = map(map_len, libc::MAP_PRIVATE | libc::MAP_ANONYMOUS)?;

    let base = raw.as_ptr().addr();
    let head = base.next_multiple_of(REGION_SIZE) - base;
    let tail = map_len - head - REGION_SIZE;

    unsafe {
        if head > 0 {
            libc::munmap(raw.as_ptr().cast(), head);
        }
        if tail > 0 {
            libc::munmap(raw.as_ptr().add(head + REGION_SIZE).cast(), tail);
        }
    }

    // Safety: head < map_len, so the pointer stays inside the mapping.
    let ptr = unsafe { raw.add(head) };
    prefault(ptr, REGION_SIZE);
    Ok((ptr, REGION_SIZE))
}

/// Maps one reserved huge page. Hugetlb mappings are aligned to the huge
/// page size, which is a multiple of `REGION_SIZE`.
#[cfg(target_os = "linux")]
pub(super) fn alloc_huge() -> io::Result<(NonNull<u8>, usize)> {
    let ptr = map(
        HUGE_PAGE_SIZE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB,
    )?;
    if ptr.as_ptr().addr() % REGION_SIZE != 0 {
        unsafe { libc::munmap(ptr.as_ptr().cast(), HUGE_PAGE_SIZE) };
        return Err(io::Error::other("huge page mapping is not region-aligned"));
    }
    prefault(ptr, REGION_SIZE);
    Ok((ptr, HUGE_PAGE_SIZE))
}

#[cfg(not(target_os = "linux"))]
pub(super) fn alloc_huge() -> io::Result<(NonNull<u8>, usize)> {
    let _ = HUGE_PAGE_SIZE;
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "huge pages require Linux hugetlbfs",
    ))
}

pub(super) fn mlock_region(ptr: NonNull<u8>, len: usize) -> io::Result<()> {
    let result = unsafe { libc::mlock(ptr.as_ptr() as *const libc::c_void, len) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// # Safety
/// `ptr` and `map_len` must come from `alloc_region` or `alloc_huge`.
pub(super) unsafe fn free_region(ptr: NonNull<u8>, map_len: usize) {
    unsafe {
        libc::munmap(ptr.as_ptr().cast(), map_len);
    }
}

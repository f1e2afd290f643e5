//! In-region object records.
//!
//! ```text
//! ┌──────────┬───────┬────────┬──────────┬───────────────────────┐
//! │ marker   │ ds_id │ id_len │ data_len │ id bytes │ payload    │
//! │ u16      │ u8    │ u8     │ u32 (le) │                       │
//! └──────────┴───────┴────────┴──────────┴───────────────────────┘
//! ```
//!
//! The marker is the only field written after construction, and only
//! atomically (live -> free).

use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU16, Ordering};

use crate::OBJECT_ALIGN;

/// Size of the header in front of every object written by
/// [`Region::new_object`](crate::Region::new_object).
pub const OBJECT_HEADER_SIZE: u32 = 8;

/// Marker value of a freed object (and of the tail filler written when a
/// region is sealed).
pub const FREE_MARKER: u16 = 0xFFFF;

// Zeroed bytes carry marker 0 and are never a valid header.
pub(crate) const LIVE_MARKER: u16 = 0x0001;
const UNWRITTEN_MARKER: u16 = 0;

#[inline]
pub(crate) const fn align_up(size: u64) -> u64 {
    let mask = OBJECT_ALIGN as u64 - 1;
    (size + mask) & !mask
}

/// Decoded object header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Set once the object has been freed.
    pub free: bool,
    /// Identifier of the data structure owning the object.
    pub ds_id: u8,
    /// Length of the object id stored in front of the payload.
    pub id_len: u8,
    /// Length of id plus payload.
    pub data_len: u32,
}

impl ObjectHeader {
    /// Bytes the object occupies in the region, header and alignment padding
    /// included.
    #[inline]
    pub fn span(&self) -> u64 {
        align_up(OBJECT_HEADER_SIZE as u64 + self.data_len as u64)
    }

    pub(crate) fn filler(data_len: u32) -> Self {
        Self {
            free: true,
            ds_id: 0,
            id_len: 0,
            data_len,
        }
    }

    /// # Safety
    ///
    /// `ptr` must be 2-aligned and valid for `OBJECT_HEADER_SIZE` bytes.
    /// Returns `None` if the bytes were never written as a header.
    pub(crate) unsafe fn read(ptr: *const u8) -> Option<Self> {
        // Safety: caller guarantees alignment and validity.
        let marker = unsafe { marker_at(ptr.cast_mut()) }.load(Ordering::Acquire);
        if marker == UNWRITTEN_MARKER {
            return None;
        }
        let mut rest = [0u8; 6];
        // Safety: bytes 2..8 are never written concurrently.
        unsafe { ptr::copy_nonoverlapping(ptr.add(2), rest.as_mut_ptr(), rest.len()) };
        Some(Self {
            free: marker == FREE_MARKER,
            ds_id: rest[0],
            id_len: rest[1],
            data_len: u32::from_le_bytes([rest[2], rest[3], rest[4], rest[5]]),
        })
    }

    /// # Safety
    ///
    /// `ptr` must be 2-aligned, valid for writes of `OBJECT_HEADER_SIZE`
    /// bytes, and not visible to any other thread yet.
    pub(crate) unsafe fn write(&self, ptr: *mut u8) {
        let marker = if self.free { FREE_MARKER } else { LIVE_MARKER };
        let len = self.data_len.to_le_bytes();
        let bytes = [self.ds_id, self.id_len, len[0], len[1], len[2], len[3]];
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(2), bytes.len());
            marker_at(ptr).store(marker, Ordering::Release);
        }
    }
}

/// # Safety
///
/// `ptr` must be 2-aligned and valid for the returned lifetime.
#[inline]
pub(crate) unsafe fn marker_at<'a>(ptr: *mut u8) -> &'a AtomicU16 {
    unsafe { AtomicU16::from_ptr(ptr.cast()) }
}

/// A borrowed view of one object in a local region.
#[derive(Clone, Copy)]
pub struct ObjectRef<'a> {
    offset: u32,
    header: ObjectHeader,
    data: &'a [u8],
}

impl<'a> ObjectRef<'a> {
    /// Offset of the object's header inside the region.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Header as it was when the view was taken.
    #[inline]
    pub fn header(&self) -> ObjectHeader {
        self.header
    }

    /// Whether the object was free when the view was taken.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.header.free
    }

    /// Owning data structure.
    #[inline]
    pub fn ds_id(&self) -> u8 {
        self.header.ds_id
    }

    /// The object id.
    #[inline]
    pub fn id(&self) -> &'a [u8] {
        &self.data[..self.header.id_len as usize]
    }

    /// The payload following the id.
    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.header.id_len as usize..]
    }
}

impl fmt::Debug for ObjectRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("offset", &self.offset)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// Walks object headers across a byte range of a region.
///
/// Raw spans from [`Region::allocate_object`](crate::Region::allocate_object)
/// are stepped over without being read. Stops at the end of the range, at
/// bytes that were never written as a header, or at a header whose data
/// would run past the range.
pub struct Objects<'a> {
    base: Option<NonNull<u8>>,
    pos: u64,
    end: u64,
    raw: &'a [Range<u32>],
    _region: PhantomData<&'a [u8]>,
}

impl<'a> Objects<'a> {
    /// # Safety
    ///
    /// When `base` is set it must point to a region buffer that outlives
    /// `'a`, `range` must lie inside it, and `range.start` must be an object
    /// start. `raw` lists the opaque spans of the region in order.
    pub(crate) unsafe fn new(
        base: Option<NonNull<u8>>,
        range: Range<u32>,
        raw: &'a [Range<u32>],
    ) -> Self {
        let first = raw.partition_point(|span| span.start < range.start);
        Self {
            base,
            pos: range.start as u64,
            end: range.end as u64,
            raw: &raw[first..],
            _region: PhantomData,
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            base: None,
            pos: 0,
            end: 0,
            raw: &[],
            _region: PhantomData,
        }
    }
}

impl<'a> Iterator for Objects<'a> {
    type Item = ObjectRef<'a>;

    fn next(&mut self) -> Option<ObjectRef<'a>> {
        let base = self.base?;
        while let [span, rest @ ..] = self.raw {
            if span.start as u64 != self.pos {
                break;
            }
            self.pos = span.end as u64;
            self.raw = rest;
        }
        if self.pos + OBJECT_HEADER_SIZE as u64 > self.end {
            return None;
        }
        // Safety: pos is an object start within the buffer (see `new`).
        let at = unsafe { base.as_ptr().add(self.pos as usize) };
        let header = match unsafe { ObjectHeader::read(at) } {
            Some(h) => h,
            None => {
                self.pos = self.end;
                return None;
            }
        };
        let data_end = self.pos + OBJECT_HEADER_SIZE as u64 + header.data_len as u64;
        if data_end > self.end {
            tracing::trace!(offset = self.pos, data_len = header.data_len, "object overruns sweep range");
            self.pos = self.end;
            return None;
        }
        // Safety: [pos, data_end) is inside the range.
        let item = unsafe { view(at, self.pos as u32, header) };
        self.pos += header.span();
        Some(item)
    }
}

/// # Safety
///
/// `at` must be a 2-aligned pointer valid for an `OBJECT_HEADER_SIZE +
/// data_len` byte object of lifetime `'a`, whose header was written.
pub(crate) unsafe fn view<'a>(at: *const u8, offset: u32, header: ObjectHeader) -> ObjectRef<'a> {
    let data = unsafe {
        std::slice::from_raw_parts(at.add(OBJECT_HEADER_SIZE as usize), header.data_len as usize)
    };
    ObjectRef {
        offset,
        header,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(8))]
    struct Block([u8; 32]);

    #[test]
    fn header_write_read() {
        let mut block = Block([0; 32]);
        let p = block.0.as_mut_ptr();
        let h = ObjectHeader {
            free: false,
            ds_id: 7,
            id_len: 3,
            data_len: 13,
        };
        unsafe {
            assert_eq!(ObjectHeader::read(p), None);
            h.write(p);
            assert_eq!(ObjectHeader::read(p), Some(h));
        }
        assert_eq!(h.span(), 24);
    }

    #[test]
    fn free_marker_reads_as_free() {
        let mut block = Block([0; 32]);
        let p = block.0.as_mut_ptr();
        unsafe {
            ObjectHeader::filler(24).write(p);
            let h = ObjectHeader::read(p).unwrap();
            assert!(h.free);
            assert_eq!(h.data_len, 24);
            assert_eq!(marker_at(p).load(Ordering::Relaxed), FREE_MARKER);
        }
    }

    #[test]
    fn align_up_rounds_to_object_align() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 8);
        assert_eq!(align_up(8), 8);
        assert_eq!(align_up(100), 104);
    }
}

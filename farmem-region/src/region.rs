use std::fmt;
use std::mem;
use std::ops::Range;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::boundary::Boundaries;
use crate::object::{self, LIVE_MARKER, ObjectHeader, ObjectRef, Objects, align_up, marker_at};
use crate::{
    Address, FREE_MARKER, GC_PARALLELISM, HEADER_SIZE, NT_POS, OBJECT_HEADER_SIZE, REF_CNT_POS,
    REGION_SIZE, RegionBuf,
};

const END: u32 = REGION_SIZE as u32;

/// A fixed-size, append-only allocation unit.
///
/// A region is either local (it owns a [`RegionBuf`] holding the header and
/// objects) or remote (only its index is known here; allocations return
/// [`Address::Remote`]). Moving a region out with [`take`](Region::take)
/// leaves an invalid placeholder behind.
///
/// Allocation advances a cursor and never reuses space until
/// [`reset`](Region::reset), which is only legal once every object's
/// reference has been dropped ([`is_gcable`](Region::is_gcable)).
///
/// Contract violations panic: querying boundaries, reference counts, or
/// resetting an invalidated region, and resetting with live references.
pub struct Region {
    buf: Option<RegionBuf>,
    index: Option<u32>,
    cursor: u32,
    boundaries: Boundaries,
    // Spans handed out by `allocate_object`, in cursor order. Their bytes
    // belong to the caller and are never decoded as headers.
    raw: Vec<Range<u32>>,
}

impl Default for Region {
    /// An invalid placeholder, as left behind by [`take`](Region::take).
    fn default() -> Self {
        Self {
            buf: None,
            index: None,
            cursor: HEADER_SIZE,
            boundaries: Boundaries::default(),
            raw: Vec::new(),
        }
    }
}

impl Region {
    /// Creates an empty local region over `buf`. The buffer is zeroed.
    pub fn local(index: u32, nt: bool, mut buf: RegionBuf) -> Self {
        buf.zero_from(0);
        let region = Self {
            buf: Some(buf),
            index: Some(index),
            ..Self::default()
        };
        if nt {
            region.set_nt();
        }
        region
    }

    /// Creates an empty placeholder for a region that lives remotely.
    pub fn remote(index: u32) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    /// Moves the region out, leaving an invalid placeholder in `self`.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Consumes the region, handing back its buffer for reuse.
    pub fn into_buf(mut self) -> Option<RegionBuf> {
        self.buf.take()
    }

    /// Returns `true` once the region has been moved out or invalidated.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.index.is_none()
    }

    /// Marks the region invalid and releases its buffer.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Returns the region index.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    #[inline]
    pub fn index(&self) -> u32 {
        match self.index {
            Some(idx) => idx,
            None => panic!("region is invalidated"),
        }
    }

    #[inline]
    fn assert_valid(&self) {
        assert!(!self.is_invalid(), "region is invalidated");
    }

    /// Returns `true` if the region's bytes are resident here.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.buf.is_some()
    }

    /// Offset of the next free byte.
    #[inline]
    pub fn first_free_byte(&self) -> u32 {
        self.cursor
    }

    /// Bytes left before the region is full.
    #[inline]
    pub fn remaining(&self) -> u32 {
        END - self.cursor
    }

    #[inline]
    fn base(&self) -> Option<NonNull<u8>> {
        self.buf.as_ref().map(RegionBuf::as_non_null)
    }

    #[inline]
    fn ref_cnt_cell(&self) -> Option<&AtomicU32> {
        // Safety: the buffer is REGION_SIZE-aligned and the count lives at
        // the 4-aligned offset REF_CNT_POS for as long as `self` is borrowed.
        self.base()
            .map(|base| unsafe { AtomicU32::from_ptr(base.as_ptr().add(REF_CNT_POS).cast()) })
    }

    #[inline]
    fn nt_cell(&self) -> Option<&AtomicU8> {
        // Safety: as for `ref_cnt_cell`.
        self.base()
            .map(|base| unsafe { AtomicU8::from_ptr(base.as_ptr().add(NT_POS)) })
    }

    /// Reserves `size` bytes (rounded up to [`OBJECT_ALIGN`](crate::OBJECT_ALIGN))
    /// and returns their address.
    ///
    /// The bytes are opaque to the region: a GC walk skips the span without
    /// reading it, and [`object`](Self::object) does not resolve inside it.
    /// Its reference stays until the owner drops it with
    /// [`inc_ref_cnt`](Self::inc_ref_cnt).
    ///
    /// A local allocation adds one reference to the region. Returns `None`
    /// if the region is invalid or the object does not fit. A failed fit
    /// seals the region: the unused tail is covered by a free filler object
    /// (when a header fits) and the cursor moves to the end, so later
    /// allocations fail too and the GC walk skips the tail.
    pub fn allocate_object(&mut self, size: u32) -> Option<Address> {
        let (span, addr) = self.reserve(size)?;
        if self.is_local() {
            self.raw.push(span);
        }
        Some(addr)
    }

    fn reserve(&mut self, size: u32) -> Option<(Range<u32>, Address)> {
        if self.is_invalid() {
            return None;
        }
        let start = self.cursor;
        let end = start as u64 + align_up(size as u64);
        if start == END || end > END as u64 {
            self.seal();
            return None;
        }

        self.boundaries.update(start, false);
        self.cursor = end as u32;

        let addr = match self.base() {
            Some(base) => {
                self.inc_ref_cnt(1);
                // Safety: start < END, inside the buffer.
                Address::Local(unsafe { base.add(start as usize) })
            }
            None => Address::Remote {
                region: self.index(),
                offset: start,
            },
        };
        Some((start..self.cursor, addr))
    }

    fn is_raw(&self, offset: u32) -> bool {
        let i = self.raw.partition_point(|span| span.end <= offset);
        self.raw.get(i).is_some_and(|span| span.contains(&offset))
    }

    fn seal(&mut self) {
        let start = self.cursor;
        if start == END {
            return;
        }
        if let Some(base) = self.base() {
            if start + OBJECT_HEADER_SIZE <= END {
                let filler = ObjectHeader::filler(END - start - OBJECT_HEADER_SIZE);
                // Safety: [start, END) is unallocated and inside the buffer;
                // `&mut self` excludes readers.
                unsafe { filler.write(base.as_ptr().add(start as usize)) };
            }
        }
        self.cursor = END;
        self.boundaries.update(END, true);
        tracing::trace!(region = self.index(), slack = END - start, "region sealed");
    }

    /// Allocates an object and writes its header, id, and payload.
    ///
    /// For a remote region only the space is reserved; the caller ships the
    /// bytes. Returns `None` when the object does not fit (see
    /// [`allocate_object`](Self::allocate_object)).
    ///
    /// # Panics
    ///
    /// Panics if `id` is longer than 255 bytes.
    pub fn new_object(&mut self, ds_id: u8, id: &[u8], payload: &[u8]) -> Option<Address> {
        let id_len = u8::try_from(id.len()).unwrap_or_else(|_| panic!("object id longer than 255 bytes"));
        let data_len = u32::try_from(id.len() + payload.len()).ok()?;
        let (_, addr) = self.reserve(data_len.checked_add(OBJECT_HEADER_SIZE)?)?;

        if let Address::Local(ptr) = addr {
            let header = ObjectHeader {
                free: false,
                ds_id,
                id_len,
                data_len,
            };
            let at = ptr.as_ptr();
            // Safety: the allocation covers header + data and is not yet
            // visible to anyone else.
            unsafe {
                let data = at.add(OBJECT_HEADER_SIZE as usize);
                std::ptr::copy_nonoverlapping(id.as_ptr(), data, id.len());
                std::ptr::copy_nonoverlapping(payload.as_ptr(), data.add(id.len()), payload.len());
                header.write(at);
            }
        }
        Some(addr)
    }

    /// Returns the offset of `addr` if it points into this region.
    pub fn offset_of(&self, addr: Address) -> Option<u32> {
        match (addr, self.base(), self.index) {
            (Address::Local(ptr), Some(base), _) => {
                let off = ptr.as_ptr().addr().checked_sub(base.as_ptr().addr())?;
                (off < REGION_SIZE).then_some(off as u32)
            }
            (Address::Remote { region, offset }, None, Some(idx)) if region == idx => Some(offset),
            _ => None,
        }
    }

    /// Reads the object whose header starts at `offset`.
    ///
    /// Returns `None` for remote regions and for offsets outside the
    /// allocated area or without a written header.
    pub fn object(&self, offset: u32) -> Option<ObjectRef<'_>> {
        let base = self.base()?;
        if offset < HEADER_SIZE || offset as u64 + OBJECT_HEADER_SIZE as u64 > self.cursor as u64 {
            return None;
        }
        if (offset - HEADER_SIZE) % crate::OBJECT_ALIGN != 0 || self.is_raw(offset) {
            return None;
        }
        // Safety: offset is an aligned position inside the written area.
        let at = unsafe { base.as_ptr().add(offset as usize) };
        let header = unsafe { ObjectHeader::read(at) }?;
        if offset as u64 + OBJECT_HEADER_SIZE as u64 + header.data_len as u64 > self.cursor as u64 {
            return None;
        }
        // Safety: header and data are inside the written area.
        Some(unsafe { object::view(at, offset, header) })
    }

    /// Walks the objects in `range`, usually one from
    /// [`gc_ranges`](Self::gc_ranges). Empty for remote regions.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid or `range` does not start at an
    /// object boundary.
    pub fn objects(&self, range: Range<u32>) -> Objects<'_> {
        self.assert_valid();
        let Some(base) = self.base() else {
            return Objects::empty();
        };
        assert!(
            range.start >= HEADER_SIZE && (range.start - HEADER_SIZE) % crate::OBJECT_ALIGN == 0,
            "range {range:?} does not start at an object boundary"
        );
        let end = range.end.min(self.cursor);
        // Safety: [start, end) lies in the written area of the buffer.
        unsafe { Objects::new(Some(base), range.start..end, &self.raw) }
    }

    /// Marks the object at `offset` free and drops its reference.
    ///
    /// Returns `false` if it was already free, has no header, or the region
    /// is remote. Safe to race: exactly one caller wins.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    pub fn free_object(&self, offset: u32) -> bool {
        self.assert_valid();
        let Some(obj) = self.object(offset) else {
            return false;
        };
        if obj.is_free() {
            return false;
        }
        let Some(base) = self.base() else {
            return false;
        };
        // Safety: `object` validated the offset.
        let marker = unsafe { marker_at(base.as_ptr().add(offset as usize)) };
        let won = marker
            .compare_exchange(LIVE_MARKER, FREE_MARKER, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.inc_ref_cnt(-1);
        }
        won
    }

    /// Borrows `len` allocated bytes starting at `addr`.
    ///
    /// # Panics
    ///
    /// Panics if the region is not local or the bytes are not inside its
    /// allocated area.
    pub fn bytes(&self, addr: Address, len: usize) -> &[u8] {
        let (base, off) = self.checked_span(addr, len);
        // Safety: span checked against the allocated area.
        unsafe { std::slice::from_raw_parts(base.as_ptr().add(off), len) }
    }

    /// Mutable counterpart of [`bytes`](Self::bytes).
    pub fn bytes_mut(&mut self, addr: Address, len: usize) -> &mut [u8] {
        let (base, off) = self.checked_span(addr, len);
        // Safety: span checked; `&mut self` makes the borrow exclusive.
        unsafe { std::slice::from_raw_parts_mut(base.as_ptr().add(off), len) }
    }

    fn checked_span(&self, addr: Address, len: usize) -> (NonNull<u8>, usize) {
        let base = match self.base() {
            Some(base) => base,
            None => panic!("region {:?} is not local", self.index),
        };
        let off = match self.offset_of(addr) {
            Some(off) => off as usize,
            None => panic!("{addr:?} is not in region {:?}", self.index),
        };
        assert!(
            off >= HEADER_SIZE as usize && off + len <= self.cursor as usize,
            "bytes {off}..{} outside allocated area",
            off + len
        );
        (base, off)
    }

    /// Rewinds the cursor, clears the boundaries, and zeroes the object area
    /// so the region can be reused. The non-temporal flag is kept.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid or still referenced.
    pub fn reset(&mut self) {
        self.assert_valid();
        let refs = self.ref_cnt();
        assert_eq!(refs, 0, "reset of region {} with {refs} live references", self.index());
        if let Some(buf) = self.buf.as_mut() {
            buf.zero_from(HEADER_SIZE as usize);
        }
        self.cursor = HEADER_SIZE;
        self.boundaries.clear();
        self.raw.clear();
        tracing::trace!(region = self.index(), "region reset");
    }

    /// Returns the non-temporal flag. Always `false` for remote regions.
    pub fn is_nt(&self) -> bool {
        self.nt_cell()
            .is_some_and(|nt| nt.load(Ordering::Relaxed) != 0)
    }

    /// Sets the non-temporal flag. No-op for remote regions.
    pub fn set_nt(&self) {
        if let Some(nt) = self.nt_cell() {
            nt.store(1, Ordering::Relaxed);
        }
    }

    /// Clears the non-temporal flag. No-op for remote regions.
    pub fn clear_nt(&self) {
        if let Some(nt) = self.nt_cell() {
            nt.store(0, Ordering::Relaxed);
        }
    }

    /// Number of live references. Remote regions report 0.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    pub fn ref_cnt(&self) -> u32 {
        self.assert_valid();
        self.ref_cnt_cell()
            .map_or(0, |cnt| cnt.load(Ordering::Acquire))
    }

    /// Drops every reference at once.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    pub fn clear_ref_cnt(&self) {
        self.assert_valid();
        if let Some(cnt) = self.ref_cnt_cell() {
            cnt.store(0, Ordering::Release);
        }
    }

    /// Atomically adds `delta` (which may be negative) to the reference
    /// count. No-op for remote regions.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    pub fn inc_ref_cnt(&self, delta: i32) {
        self.assert_valid();
        if let Some(cnt) = self.ref_cnt_cell() {
            apply_delta(cnt, delta);
        }
    }

    /// Whether the region may be reset: valid and unreferenced.
    pub fn is_gcable(&self) -> bool {
        !self.is_invalid() && self.ref_cnt() == 0
    }

    /// Number of GC boundaries recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    pub fn num_boundaries(&self) -> usize {
        self.assert_valid();
        self.boundaries.len()
    }

    /// Byte range GC worker `idx` sweeps: from the previous boundary (or the
    /// header end) to boundary `idx`, or to the cursor when
    /// `idx == num_boundaries()`.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid or `idx > num_boundaries()`.
    pub fn get_boundary(&self, idx: usize) -> Range<u32> {
        self.assert_valid();
        self.boundaries.range(idx, self.cursor)
    }

    /// The non-empty sweep ranges. Together they cover
    /// `HEADER_SIZE..first_free_byte()` exactly, and there are at most
    /// `GC_PARALLELISM` of them once the region is sealed.
    ///
    /// # Panics
    ///
    /// Panics if the region is invalid.
    pub fn gc_ranges(&self) -> impl Iterator<Item = Range<u32>> + '_ {
        self.assert_valid();
        (0..=self.boundaries.len().min(GC_PARALLELISM))
            .map(move |i| self.boundaries.range(i, self.cursor))
            .filter(|r| !r.is_empty())
    }

    /// Reads the non-temporal flag of the local region containing `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must point into a live [`RegionBuf`] that holds a region.
    pub unsafe fn is_nt_at(addr: NonNull<u8>) -> bool {
        let base = region_base(addr);
        // Safety: caller guarantees `base` is a live region buffer.
        unsafe { AtomicU8::from_ptr(base.add(NT_POS)) }.load(Ordering::Relaxed) != 0
    }

    /// Adds `delta` to the reference count of the local region containing
    /// `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must point into a live [`RegionBuf`] that holds a region.
    pub unsafe fn inc_ref_cnt_at(addr: NonNull<u8>, delta: i32) {
        let base = region_base(addr);
        // Safety: caller guarantees `base` is a live region buffer.
        let cnt = unsafe { AtomicU32::from_ptr(base.add(REF_CNT_POS).cast()) };
        apply_delta(cnt, delta);
    }
}

#[inline]
fn region_base(addr: NonNull<u8>) -> *mut u8 {
    addr.as_ptr().map_addr(|a| a & !(REGION_SIZE - 1))
}

#[inline]
fn apply_delta(cnt: &AtomicU32, delta: i32) {
    let prev = cnt.fetch_add(delta as u32, Ordering::AcqRel);
    debug_assert!(
        prev as i64 + delta as i64 >= 0,
        "region reference count underflow ({prev} + {delta})"
    );
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Region");
        d.field("index", &self.index)
            .field("local", &self.is_local())
            .field("first_free_byte", &self.cursor)
            .field("boundaries", &self.boundaries.len())
            .field("raw_spans", &self.raw.len());
        if !self.is_invalid() {
            d.field("ref_cnt", &self.ref_cnt());
        }
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Region {
        Region::local(0, false, RegionBuf::new().unwrap())
    }

    #[test]
    fn three_objects_from_header() {
        let mut r = local();
        let a = r.allocate_object(100).unwrap();
        let b = r.allocate_object(200).unwrap();
        let c = r.allocate_object(300).unwrap();

        assert_eq!(r.offset_of(a), Some(6));
        assert_eq!(r.offset_of(b), Some(110));
        assert_eq!(r.offset_of(c), Some(310));
        assert_eq!(r.first_free_byte(), 614);
        assert_eq!(r.ref_cnt(), 3);
        assert!(!r.is_gcable());
    }

    #[test]
    fn oversized_allocation_seals_with_filler() {
        let mut r = local();
        r.allocate_object(100).unwrap();
        assert!(r.allocate_object(REGION_SIZE as u32).is_none());

        assert_eq!(r.first_free_byte(), END);
        assert_eq!(r.ref_cnt(), 1);
        let filler = r.object(110).unwrap();
        assert!(filler.is_free());
        assert_eq!(filler.header().data_len, END - 110 - OBJECT_HEADER_SIZE);

        // Sealed: even a tiny object no longer fits.
        assert!(r.allocate_object(8).is_none());
        assert_eq!(r.num_boundaries(), 1);
        assert_eq!(r.get_boundary(0), HEADER_SIZE..END);
    }

    #[test]
    fn remote_allocation_returns_region_offset() {
        let mut r = Region::remote(5);
        let a = r.allocate_object(10).unwrap();
        assert_eq!(a, Address::Remote { region: 5, offset: 6 });
        assert_eq!(a.to_remote_raw(), Some(5 * REGION_SIZE as u64 + 6));
        assert_eq!(r.ref_cnt(), 0);
        assert!(r.is_gcable());
        assert!(!r.is_local());
    }

    #[test]
    fn invalid_region_never_allocates() {
        let mut r = local();
        let mut moved = r.take();
        assert!(r.is_invalid());
        assert!(r.allocate_object(8).is_none());
        assert!(!r.is_gcable());
        assert!(moved.allocate_object(8).is_some());
    }

    #[test]
    #[should_panic(expected = "invalidated")]
    fn boundary_query_on_invalid_region_panics() {
        let r = Region::default();
        let _ = r.get_boundary(0);
    }

    #[test]
    #[should_panic(expected = "live references")]
    fn reset_with_references_panics() {
        let mut r = local();
        r.allocate_object(8).unwrap();
        r.reset();
    }

    #[test]
    fn reset_rewinds_and_keeps_nt() {
        let mut r = Region::local(1, true, RegionBuf::new().unwrap());
        let a = r.new_object(1, b"k", b"value").unwrap();
        r.inc_ref_cnt(-1);
        r.reset();

        assert_eq!(r.first_free_byte(), HEADER_SIZE);
        assert_eq!(r.num_boundaries(), 0);
        assert!(r.is_nt());
        assert!(r.object(HEADER_SIZE).is_none());
        // Same slot comes back.
        assert_eq!(r.allocate_object(8), Some(a));
    }

    #[test]
    fn nt_flag() {
        let r = local();
        assert!(!r.is_nt());
        r.set_nt();
        assert!(r.is_nt());
        r.clear_nt();
        assert!(!r.is_nt());
    }

    #[test]
    fn new_object_round_trips_through_header() {
        let mut r = local();
        let addr = r.new_object(9, b"id", b"payload").unwrap();
        let off = r.offset_of(addr).unwrap();
        let obj = r.object(off).unwrap();
        assert_eq!(obj.ds_id(), 9);
        assert_eq!(obj.id(), b"id");
        assert_eq!(obj.payload(), b"payload");
        assert!(!obj.is_free());
        // 8-byte header + 9 data bytes, rounded up.
        assert_eq!(r.first_free_byte(), HEADER_SIZE + 24);
    }

    #[test]
    fn free_object_once() {
        let mut r = local();
        let addr = r.new_object(0, b"", &[1, 2, 3]).unwrap();
        let off = r.offset_of(addr).unwrap();
        assert_eq!(r.ref_cnt(), 1);

        assert!(r.free_object(off));
        assert!(!r.free_object(off));
        assert_eq!(r.ref_cnt(), 0);
        assert!(r.object(off).unwrap().is_free());
    }

    #[test]
    fn objects_walks_in_order() {
        let mut r = local();
        for i in 0..5u8 {
            r.new_object(i, &[i], &vec![0; i as usize * 10]).unwrap();
        }
        let ids: Vec<u8> = r
            .gc_ranges()
            .flat_map(|range| r.objects(range))
            .map(|o| o.ds_id())
            .collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn raw_allocations_have_no_headers() {
        let mut r = local();
        r.allocate_object(32).unwrap();
        assert_eq!(r.objects(HEADER_SIZE..r.first_free_byte()).count(), 0);
    }

    #[test]
    fn raw_bytes_never_read_as_header() {
        let mut r = local();
        let raw = r.allocate_object(16).unwrap();
        // Caller data that starts like a live header.
        r.bytes_mut(raw, 16).copy_from_slice(&[1, 0, 0, 0, 4, 0, 0, 0, 9, 9, 9, 9, 9, 9, 9, 9]);
        r.new_object(5, b"x", b"after").unwrap();

        let offsets: Vec<u32> = r.objects(HEADER_SIZE..r.first_free_byte()).map(|o| o.offset()).collect();
        assert_eq!(offsets, [HEADER_SIZE + 16]);
        assert!(r.object(HEADER_SIZE).is_none());
        assert!(!r.free_object(HEADER_SIZE));
        assert_eq!(r.ref_cnt(), 2);
        assert_eq!(r.bytes(raw, 2), &[1, 0]);
    }

    #[test]
    fn walk_continues_past_raw_span() {
        let mut r = local();
        r.new_object(1, b"a", b"").unwrap();
        r.allocate_object(32).unwrap();
        r.allocate_object(0).unwrap();
        r.new_object(2, b"b", b"").unwrap();

        let ids: Vec<u8> = r
            .gc_ranges()
            .flat_map(|range| r.objects(range))
            .map(|o| o.ds_id())
            .collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn reset_forgets_raw_spans() {
        let mut r = local();
        r.allocate_object(16).unwrap();
        r.inc_ref_cnt(-1);
        r.reset();
        r.new_object(3, b"", b"").unwrap();
        assert_eq!(r.object(HEADER_SIZE).map(|o| o.ds_id()), Some(3));
    }

    #[test]
    fn address_helpers_find_header() {
        let mut r = local();
        r.set_nt();
        let addr = r.allocate_object(64).unwrap().as_local().unwrap();
        let inner = unsafe { addr.add(40) };
        unsafe {
            assert!(Region::is_nt_at(inner));
            Region::inc_ref_cnt_at(inner, 2);
        }
        assert_eq!(r.ref_cnt(), 3);
        unsafe { Region::inc_ref_cnt_at(addr, -3) };
        assert!(r.is_gcable());
    }

    #[test]
    fn bytes_mut_writes_are_visible() {
        let mut r = local();
        let addr = r.allocate_object(16).unwrap();
        r.bytes_mut(addr, 16).copy_from_slice(&[7; 16]);
        assert_eq!(r.bytes(addr, 16), &[7; 16]);
    }

    #[test]
    #[should_panic(expected = "outside allocated area")]
    fn bytes_past_cursor_panics() {
        let mut r = local();
        let addr = r.allocate_object(16).unwrap();
        let _ = r.bytes(addr, 17);
    }

    #[test]
    fn boundary_splits_near_half() {
        let mut r = local();
        let half = (REGION_SIZE / 2) as u32;
        while r.first_free_byte() < half {
            r.allocate_object(1000).unwrap();
        }
        // Recorded lazily, at the first allocation starting past the split.
        assert_eq!(r.num_boundaries(), 0);
        let split = r.first_free_byte();
        r.allocate_object(1000).unwrap();
        assert_eq!(r.num_boundaries(), 1);
        assert_eq!(r.get_boundary(0), HEADER_SIZE..split);
        assert_eq!(r.get_boundary(1), split..r.first_free_byte());
    }
}

//! GC sweep boundaries.
//!
//! A region is split into at most [`GC_PARALLELISM`] consecutive ranges, one
//! per GC worker. Boundaries are only ever recorded at the allocation cursor,
//! which always sits at an object end, so no range splits an object.

use std::ops::Range;

use crate::{GC_PARALLELISM, HEADER_SIZE, REGION_SIZE};

const SEGMENT: u32 = (REGION_SIZE / GC_PARALLELISM) as u32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Boundaries {
    offsets: [u32; GC_PARALLELISM],
    len: u8,
}

impl Boundaries {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    fn last(&self) -> u32 {
        match self.len {
            0 => HEADER_SIZE,
            n => self.offsets[n as usize - 1],
        }
    }

    /// Records `cursor` as the next boundary once it reaches that boundary's
    /// even split point of the region, or unconditionally when `force` is
    /// set. Never records an offset at or before the previous boundary.
    pub(crate) fn update(&mut self, cursor: u32, force: bool) {
        let idx = self.len();
        if idx >= GC_PARALLELISM || cursor <= self.last() {
            return;
        }
        if force || cursor >= SEGMENT * (idx as u32 + 1) {
            self.offsets[idx] = cursor;
            self.len += 1;
        }
    }

    /// Byte range worker `idx` sweeps. `idx == len()` is the open tail from
    /// the last boundary up to `cursor`.
    pub(crate) fn range(&self, idx: usize, cursor: u32) -> Range<u32> {
        assert!(
            idx <= self.len(),
            "boundary index {idx} out of range ({} boundaries)",
            self.len
        );
        let start = match idx {
            0 => HEADER_SIZE,
            i => self.offsets[i - 1],
        };
        let end = if idx < self.len() {
            self.offsets[idx]
        } else {
            cursor.max(start)
        };
        start..end
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

//! Object addresses.

use std::fmt;
use std::ptr::NonNull;

use crate::{REGION_SHIFT, REGION_SIZE};

/// Where an allocated object lives.
///
/// A local object is reached through a pointer into its region's buffer. A
/// remote object is identified by its region index and offset; the runtime's
/// resolver fetches it on demand.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Pointer to the object's first byte in a local region buffer.
    Local(NonNull<u8>),
    /// Object in a region that is not resident locally.
    Remote {
        /// Index of the owning region.
        region: u32,
        /// Byte offset inside the region.
        offset: u32,
    },
}

// Safety: an address is a plain value. Dereferencing a `Local` pointer is
// already unsafe and carries its own requirements.
unsafe impl Send for Address {}
unsafe impl Sync for Address {}

impl Address {
    /// Returns `true` for [`Address::Local`].
    #[inline]
    pub fn is_local(self) -> bool {
        matches!(self, Address::Local(_))
    }

    /// Byte offset of the object inside its region.
    #[inline]
    pub fn offset(self) -> u32 {
        match self {
            Address::Local(ptr) => (ptr.as_ptr().addr() & (REGION_SIZE - 1)) as u32,
            Address::Remote { offset, .. } => offset,
        }
    }

    /// Returns the local pointer, or `None` for a remote address.
    #[inline]
    pub fn as_local(self) -> Option<NonNull<u8>> {
        match self {
            Address::Local(ptr) => Some(ptr),
            Address::Remote { .. } => None,
        }
    }

    /// Packs a remote address as `region * REGION_SIZE + offset`.
    ///
    /// Returns `None` for a local address; local pointers are not encoded.
    #[inline]
    pub fn to_remote_raw(self) -> Option<u64> {
        match self {
            Address::Local(_) => None,
            Address::Remote { region, offset } => {
                Some(((region as u64) << REGION_SHIFT) | offset as u64)
            }
        }
    }

    /// Inverse of [`to_remote_raw`](Self::to_remote_raw).
    #[inline]
    pub fn from_remote_raw(raw: u64) -> Self {
        Address::Remote {
            region: (raw >> REGION_SHIFT) as u32,
            offset: (raw & (REGION_SIZE as u64 - 1)) as u32,
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Local(ptr) => write!(f, "Local({:p})", ptr.as_ptr()),
            Address::Remote { region, offset } => {
                write!(f, "Remote {{ region: {region}, offset: {offset:#x} }}")
            }
        }
    }
}

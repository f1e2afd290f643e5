//! # farmem-region
//!
//! The allocation unit of the far-memory runtime: a 1 MiB append-only
//! [`Region`] that hands out object slots, counts live references, and
//! records where a parallel GC may split its sweep.
//!
//! ## Layout
//!
//! ```text
//! 0        4    5    6                                     cursor      1 MiB
//! ┌────────┬────┬────┬──────────┬──────────┬─────┬─────────┬──────────┐
//! │ refcnt │ nt │rsvd│ object 0 │ object 1 │ ... │ object n│  free    │
//! └────────┴────┴────┴──────────┴──────────┴─────┴─────────┴──────────┘
//!                    ^ HEADER_SIZE          ^ GC boundary
//! ```
//!
//! Local region buffers are `REGION_SIZE`-aligned, so the header of the
//! region holding any local object is found by masking the object address
//! (see [`Region::inc_ref_cnt_at`]).
//!
//! ## Objects
//!
//! [`Region::allocate_object`] only reserves bytes. [`Region::new_object`]
//! additionally writes an [`ObjectHeader`], which lets the GC walk the
//! region with [`Region::objects`] and mark dead objects free.
//!
//! ## Example
//!
//! ```
//! use farmem_region::{Region, RegionBuf, HEADER_SIZE};
//!
//! let buf = RegionBuf::new().unwrap();
//! let mut region = Region::local(0, false, buf);
//!
//! let a = region.allocate_object(100).unwrap();
//! let b = region.allocate_object(200).unwrap();
//! assert_eq!(region.offset_of(a), Some(HEADER_SIZE));
//! assert_eq!(region.offset_of(b), Some(HEADER_SIZE + 104));
//! assert_eq!(region.ref_cnt(), 2);
//!
//! region.inc_ref_cnt(-2);
//! assert!(region.is_gcable());
//! region.reset();
//! assert_eq!(region.first_free_byte(), HEADER_SIZE);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod boundary;
mod error;
mod object;
mod region;
mod sys;

pub use address::Address;
pub use error::RegionError;
pub use object::{FREE_MARKER, OBJECT_HEADER_SIZE, ObjectHeader, ObjectRef, Objects};
pub use region::Region;
pub use sys::{RegionBuf, RegionBufBuilder};

/// log2 of [`REGION_SIZE`].
pub const REGION_SHIFT: u32 = 20;

/// Size of every region in bytes (1 MiB).
pub const REGION_SIZE: usize = 1 << REGION_SHIFT;

/// Byte offset of the 4-byte reference count.
pub const REF_CNT_POS: usize = 0;

/// Byte offset of the 1-byte non-temporal flag.
pub const NT_POS: usize = 4;

/// Bytes reserved at the start of a region; the first object starts here.
pub const HEADER_SIZE: u32 = 6;

/// Maximum number of GC workers that sweep one region concurrently.
pub const GC_PARALLELISM: usize = 2;

/// Every allocation is rounded up to a multiple of this.
pub const OBJECT_ALIGN: u32 = 8;

/// Large-page size that regions must tile evenly.
pub const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

const _: () = assert!(REGION_SIZE <= HUGE_PAGE_SIZE);
const _: () = assert!(HUGE_PAGE_SIZE % REGION_SIZE == 0);
const _: () = assert!(REGION_SIZE <= u32::MAX as usize);

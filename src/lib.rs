//! Two-Level Segregated Fit (TLSF) memory allocator.
//!
//! TLSF hands out blocks from memory regions ("pools") the caller gives it,
//! and does it in bounded time: free blocks are kept in lists segregated by
//! size class, and two levels of bitmaps tell which lists are non empty, so
//! finding a block is a couple of bit scans no matter how fragmented the
//! pools are.
//!
//! ```text
//!              first level: power of two
//!          +-----+-----+-----+-----+-----+ ...
//!          | 2^8 | 2^9 |2^10 |2^11 |2^12 |
//!          +-----+-----+--+--+-----+-----+ ...
//!                         |
//!            second level: 32 slices of the octave
//!          +---+---+---+--+---+---+ ... +---+
//!          |   |   |   | ## |   |       |   |
//!          +---+---+---+-+--+---+ ... +---+
//!                        |
//!                        v
//!                  Free -> Free -> Free
//! ```
//!
//! The allocator never asks the system for memory. Regions come from the
//! caller, a static buffer, or a [`MappedRegion`].
//!
//! ```
//! use tlsf_alloc::{MappedRegion, Tlsf};
//!
//! let mut region = MappedRegion::new(64 * 1024).unwrap();
//! let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
//!
//! let ptr = tlsf.malloc(100).unwrap();
//! unsafe { tlsf.free(Some(ptr)) };
//! assert_eq!(tlsf.malloc(100), Some(ptr));
//! ```

mod block;
mod check;
mod coalesce;
mod config;
mod error;
mod freelist;
mod heap;
mod kernel;
mod list;
mod mapping;
mod region;
mod tlsf;
mod utils;

pub use config::{
    ALIGN_SIZE, ALLOC_OVERHEAD, BLOCK_SIZE_MAX, BLOCK_SIZE_MIN, CONTROL_SIZE, POOL_OVERHEAD,
};
pub use error::{IntegrityError, TlsfError};
pub use heap::{Heap, LockedHeap};
pub use kernel::{MappedRegion, page_size};
pub use region::{BlockInfo, Pool};
pub use tlsf::Tlsf;
pub use utils::{align_down, align_up};

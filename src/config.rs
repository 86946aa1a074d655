//! Compile time configuration of the allocator.
//!
//! The class layout is fixed at build time. Only [`SL_INDEX_COUNT_LOG2`] is
//! meant to be tuned; everything else is derived from it and from the
//! target's pointer width.
//!
//! The public constants at the bottom of this file describe the memory cost
//! of the allocator so callers can size a region before handing it over:
//!
//! ```text
//! region given to `create_with_pool`
//! +--------------+-----------------------------------------------+
//! | CONTROL_SIZE |  pool: usable bytes + POOL_OVERHEAD            |
//! +--------------+-----------------------------------------------+
//! ```

use std::mem;

use crate::{block::BlockHeader, freelist::Control};

/// log2 of the number of linear subdivisions of every first level class.
/// Larger values make the control structure bigger. 4 or 5 are typical.
pub(crate) const SL_INDEX_COUNT_LOG2: usize = 5;

/// All allocation sizes and addresses are aligned to this many bytes.
#[cfg(target_pointer_width = "64")]
pub(crate) const ALIGN_SIZE_LOG2: usize = 3;
#[cfg(not(target_pointer_width = "64"))]
pub(crate) const ALIGN_SIZE_LOG2: usize = 2;

/// Largest supported block is `1 << FL_INDEX_MAX` bytes.
#[cfg(target_pointer_width = "64")]
pub(crate) const FL_INDEX_MAX: usize = 32;
#[cfg(not(target_pointer_width = "64"))]
pub(crate) const FL_INDEX_MAX: usize = 30;

pub(crate) const SL_INDEX_COUNT: usize = 1 << SL_INDEX_COUNT_LOG2;

/// Sizes below `1 << FL_INDEX_SHIFT` would be split into more second level
/// slots than there are distinct aligned sizes, so they all share first
/// level class 0 instead.
pub(crate) const FL_INDEX_SHIFT: usize = SL_INDEX_COUNT_LOG2 + ALIGN_SIZE_LOG2;

pub(crate) const FL_INDEX_COUNT: usize = FL_INDEX_MAX - FL_INDEX_SHIFT + 1;

/// Threshold below which sizes are subdivided linearly.
pub(crate) const SMALL_BLOCK_SIZE: usize = 1 << FL_INDEX_SHIFT;

/// Second level bitmap word. One bit per second level class.
pub(crate) type SlBitmap = u32;

/// First level bitmap word. One bit per first level class.
pub(crate) type FlBitmap = u32;

const _: () = {
    assert!(ALIGN_SIZE == SMALL_BLOCK_SIZE / SL_INDEX_COUNT);
    assert!(SlBitmap::BITS as usize >= SL_INDEX_COUNT);
    assert!(FlBitmap::BITS as usize >= FL_INDEX_COUNT);
    assert!(mem::size_of::<usize>() * 8 > FL_INDEX_MAX);
};

/// Alignment of every size and every pointer handed out by the allocator.
pub const ALIGN_SIZE: usize = 1 << ALIGN_SIZE_LOG2;

/// Bytes a used block spends on its header: the size word and the flags word.
///
/// The back link to the previous physical block lives in the tail of that
/// previous block while it is free, so it costs nothing here.
pub const ALLOC_OVERHEAD: usize = mem::size_of::<usize>() + mem::size_of::<usize>();

/// Smallest block the allocator will create.
///
/// A free block has to hold its two free list links plus the back link of
/// the block that follows it. Its own back link lives in the previous block.
pub const BLOCK_SIZE_MIN: usize = mem::size_of::<BlockHeader>() - ALLOC_OVERHEAD;

/// Upper bound (exclusive) for the size of a single block.
pub const BLOCK_SIZE_MAX: usize = 1 << FL_INDEX_MAX;

/// Bytes consumed by the bookkeeping of one pool: the header of its initial
/// free block and the zero sized sentinel at its end.
pub const POOL_OVERHEAD: usize = 2 * ALLOC_OVERHEAD;

/// Size of the control structure placed at the start of the memory given
/// to [`Tlsf::create`](crate::Tlsf::create).
pub const CONTROL_SIZE: usize = mem::size_of::<Control>();

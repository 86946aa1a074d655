//! This file contains all the helper functions for the allocator.
//! These are functions that don't particularly belong to any concrete module of the program.

/// It aligns `to_be_aligned` up to the next multiple of `alignment`.
///
/// This is used to round request sizes to [`crate::ALIGN_SIZE`], to round
/// mapped regions up to the page size and to find the first aligned payload
/// address inside a block for `memalign`. `alignment` must be a power of two.
#[inline]
pub const fn align_up(to_be_aligned: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (to_be_aligned + (alignment - 1)) & !(alignment - 1)
}

/// It aligns `to_be_aligned` down to the previous multiple of `alignment`.
///
/// Pool lengths are rounded down with this so the initial free block never
/// claims bytes past the end of the region the caller gave us.
#[inline]
pub const fn align_down(to_be_aligned: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    to_be_aligned - (to_be_aligned & (alignment - 1))
}

/// Pointer flavour of [`align_up`]. Keeps the provenance of `ptr`.
#[inline]
pub fn align_ptr(ptr: *mut u8, alignment: usize) -> *mut u8 {
    let addr = ptr as usize;
    ptr.wrapping_add(align_up(addr, alignment) - addr)
}

/// Tells whether `addr` is a multiple of `alignment`.
#[inline]
pub const fn is_aligned(addr: usize, alignment: usize) -> bool {
    addr & (alignment - 1) == 0
}

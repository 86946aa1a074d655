//! Size class mapping.
//!
//! A size is filed under a pair of indices. The first level is the power of
//! two octave the size falls in, the second level splits every octave into
//! [`SL_INDEX_COUNT`] equal slices:
//!
//! ```text
//!  fl = 0            fl = 8                 fl = 9
//! +--+--+-- ... --+ +----+----+-- ... --+ +--------+-- ... --+
//! |0 |8 |   ...   | |256 |264 |   ...   | |512     |   ...   |
//! +--+--+-- ... --+ +----+----+-- ... --+ +--------+-- ... --+
//!  linear, ALIGN_SIZE   32 slices of 8       32 slices of 16
//! ```
//!
//! Sizes below [`SMALL_BLOCK_SIZE`] all live in first level 0, where every
//! second level slot covers exactly one aligned size.

use crate::config::{FL_INDEX_SHIFT, SL_INDEX_COUNT, SL_INDEX_COUNT_LOG2, SMALL_BLOCK_SIZE};

/// Index of the most significant set bit. `size` must not be 0.
#[inline]
fn fls(size: usize) -> usize {
    debug_assert!(size != 0);
    (usize::BITS - 1 - size.leading_zeros()) as usize
}

/// Computes the `(fl, sl)` pair a block of `size` bytes is filed under.
#[inline]
pub(crate) fn classify(size: usize) -> (usize, usize) {
    if size < SMALL_BLOCK_SIZE {
        // Store small blocks in first list.
        return (0, size / (SMALL_BLOCK_SIZE / SL_INDEX_COUNT));
    }

    let fl = fls(size);
    let sl = (size >> (fl - SL_INDEX_COUNT_LOG2)) ^ (1 << SL_INDEX_COUNT_LOG2);

    (fl - (FL_INDEX_SHIFT - 1), sl)
}

/// Like [`classify`], but rounds `size` up to the next second level boundary
/// first. Any block listed at or above the returned pair is large enough for
/// `size`, so the search never has to walk a list.
#[inline]
pub(crate) fn search_round(size: usize) -> (usize, usize) {
    classify(round_up(size))
}

#[inline]
fn round_up(size: usize) -> usize {
    if size >= SMALL_BLOCK_SIZE {
        let round = (1 << (fls(size) - SL_INDEX_COUNT_LOG2)) - 1;
        size + round
    } else {
        size
    }
}

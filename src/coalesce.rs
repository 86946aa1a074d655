//! Split and merge engine.
//!
//! Blocks are only ever created by splitting a free block and only ever
//! destroyed by merging them into a physical neighbour. Everything here
//! keeps the free lists and the prev-free flags in sync with the physical
//! layout of the pool.

use crate::{
    block::Block,
    config::{ALLOC_OVERHEAD, BLOCK_SIZE_MIN},
    freelist::Control,
};

impl Control {
    /// Merges `block` with the block physically before it if that one is free.
    ///
    /// The predecessor leaves its free list. The returned block is where the
    /// (possibly) merged block now starts.
    pub(crate) fn merge_with_prev(&mut self, block: Block) -> Block {
        if !block.is_prev_free() {
            return block;
        }

        let prev = block.prev();
        debug_assert!(prev.is_free(), "prev block is not free though marked as such");

        self.remove(prev);
        prev.absorb(block)
    }

    /// Merges `block` with the block physically after it if that one is free.
    pub(crate) fn merge_with_next(&mut self, block: Block) -> Block {
        let next = block.next();

        if !next.is_free() {
            return block;
        }

        debug_assert!(!block.is_last(), "previous block can't be last");
        self.remove(next);
        block.absorb(next)
    }

    /// Trims the trailing excess of a free block that was just taken out of
    /// its list and returns the excess to the registry.
    pub(crate) fn trim_free(&mut self, block: Block, size: usize) {
        debug_assert!(block.is_free(), "block must be free");

        if block.can_split(size) {
            let remaining = block.split(size);
            block.link_next();
            remaining.set_prev_free();
            self.insert(remaining);
        }
    }

    /// Trims the trailing excess of a used block.
    ///
    /// The excess first absorbs a free successor so the pool never ends up
    /// with two adjacent free blocks.
    pub(crate) fn trim_used(&mut self, block: Block, size: usize) {
        debug_assert!(!block.is_free(), "block must be used");

        if block.can_split(size) {
            // If the next block is free, we must coalesce.
            let remaining = block.split(size);
            remaining.set_prev_used();

            let remaining = self.merge_with_next(remaining);
            self.insert(remaining);
        }
    }

    /// Gives the first `gap` bytes of a free block back to the registry and
    /// returns the block that now starts `gap` bytes later.
    ///
    /// ```text
    /// +--------+-------------------------------------+
    /// | header |               free                  |
    /// +--------+-------------------------------------+
    ///          |<------ gap ------>|
    ///                              v aligned payload
    /// +--------+------------+--------+---------------+
    /// | header | free, list | header |   returned    |
    /// +--------+------------+--------+---------------+
    /// ```
    pub(crate) fn trim_free_leading(&mut self, block: Block, gap: usize) -> Block {
        if !block.can_split(gap) {
            return block;
        }

        debug_assert!(gap >= ALLOC_OVERHEAD + BLOCK_SIZE_MIN);

        // The last word of the leading block becomes the back link of the
        // remaining one.
        let remaining = block.split(gap - ALLOC_OVERHEAD);
        remaining.set_prev_free();

        block.link_next();
        self.insert(block);

        remaining
    }
}

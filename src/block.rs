use std::{mem, mem::offset_of, ptr::NonNull};

use bitflags::bitflags;

use crate::config::{ALIGN_SIZE, ALLOC_OVERHEAD, BLOCK_SIZE_MIN};

bitflags! {
    /// Status bits kept next to the size of every block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct BlockFlags: usize {
        /// The block itself is free and linked into a free list.
        const FREE = 1 << 0;
        /// The block physically before this one is free, so
        /// [`BlockHeader::prev_phys_block`] holds a valid back link.
        const PREV_FREE = 1 << 1;
    }
}

/// In-pool layout of a block header. Content is placed after `flags`.
///
/// ```text
///           +---------------------+ <------+
///           |   prev_phys_block   |        | -> tail of the previous block,
///           |                     |        |    only valid if PREV_FREE
/// block --> +---------------------+ <------+
///           |        size         |        |
///           +---------------------+        | -> ALLOC_OVERHEAD
///           |        flags        |        |
/// payload ->+---------------------+ <------+
///           |      next_free      |        |
///           +---------------------+        | -> only valid if FREE
///           |      prev_free      |        |
///           +---------------------+ <------+
///           |         ...         |
///           |         ...         |
///           +---------------------+ <------+
///           | next prev_phys_block|        | -> overlaps the next header
///           +---------------------+ <------+
/// ```
///
/// The struct is never built as a Rust value. The first block of a pool
/// starts one word before the pool, so its `prev_phys_block` lies outside
/// memory we own, and the zero sized sentinel at the end of a pool has its
/// free list links past the pool. Every access therefore goes through
/// [`Block`], which computes field addresses with wrapping arithmetic and
/// touches only the fields that are valid for the block's current state.
#[repr(C)]
#[allow(dead_code)]
pub(crate) struct BlockHeader {
    prev_phys_block: Option<Block>,
    size: usize,
    flags: BlockFlags,
    next_free: Option<Block>,
    prev_free: Option<Block>,
}

/// Offset from the block header to the payload handed out to the user.
pub(crate) const BLOCK_START_OFFSET: usize =
    offset_of!(BlockHeader, flags) + mem::size_of::<usize>();

/// Handle to a block header living inside a pool.
///
/// Handles are plain pointers, so they are `Copy` and compare by address.
/// Creating one is `unsafe`: the caller promises the header belongs to a
/// pool registered with the allocator. From then on the accessors below are
/// the only code in the crate that reads or writes header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Block(NonNull<BlockHeader>);

impl Block {
    /// Wraps the header located at `ptr`.
    ///
    /// **SAFETY**: `ptr` must be the address of a block header inside a pool
    /// (or the header of a pool's first block, one word before the pool).
    #[inline]
    pub unsafe fn from_header(ptr: NonNull<u8>) -> Self {
        Self(ptr.cast())
    }

    /// Recovers the block that owns the payload pointer `ptr`.
    ///
    /// **SAFETY**: `ptr` must have been returned by [`Block::to_ptr`].
    #[inline]
    pub unsafe fn from_ptr(ptr: NonNull<u8>) -> Self {
        let header = ptr.as_ptr().wrapping_sub(BLOCK_START_OFFSET);
        // SAFETY: a payload pointer is never closer than BLOCK_START_OFFSET
        // to the bottom of the address space.
        unsafe { Self(NonNull::new_unchecked(header.cast())) }
    }

    /// Address of the header itself.
    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Start of the payload.
    #[inline]
    pub fn to_ptr(self) -> NonNull<u8> {
        let ptr = self.field::<u8>(BLOCK_START_OFFSET);
        // SAFETY: derived from a non null header by a small positive offset.
        unsafe { NonNull::new_unchecked(ptr) }
    }

    #[inline]
    fn field<T>(self, offset: usize) -> *mut T {
        self.0.as_ptr().cast::<u8>().wrapping_add(offset).cast()
    }

    #[inline]
    pub fn size(self) -> usize {
        unsafe { self.field::<usize>(offset_of!(BlockHeader, size)).read() }
    }

    #[inline]
    pub fn set_size(self, size: usize) {
        unsafe { self.field::<usize>(offset_of!(BlockHeader, size)).write(size) }
    }

    #[inline]
    fn flags(self) -> BlockFlags {
        unsafe { self.field::<BlockFlags>(offset_of!(BlockHeader, flags)).read() }
    }

    #[inline]
    pub fn set_flags(self, flags: BlockFlags) {
        unsafe { self.field::<BlockFlags>(offset_of!(BlockHeader, flags)).write(flags) }
    }

    #[inline]
    fn update_flags(self, flag: BlockFlags, value: bool) {
        let mut flags = self.flags();
        flags.set(flag, value);
        self.set_flags(flags);
    }

    /// The zero sized sentinel that closes every pool.
    #[inline]
    pub fn is_last(self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn is_free(self) -> bool {
        self.flags().contains(BlockFlags::FREE)
    }

    #[inline]
    pub fn set_free(self) {
        self.update_flags(BlockFlags::FREE, true);
    }

    #[inline]
    pub fn set_used(self) {
        self.update_flags(BlockFlags::FREE, false);
    }

    #[inline]
    pub fn is_prev_free(self) -> bool {
        self.flags().contains(BlockFlags::PREV_FREE)
    }

    #[inline]
    pub fn set_prev_free(self) {
        self.update_flags(BlockFlags::PREV_FREE, true);
    }

    #[inline]
    pub fn set_prev_used(self) {
        self.update_flags(BlockFlags::PREV_FREE, false);
    }

    /// The block physically before this one.
    ///
    /// The back link shares storage with the tail of the previous block, so
    /// it only exists while that block is free. Asking for it otherwise is a
    /// bug in the allocator and panics instead of returning garbage.
    #[inline]
    pub fn prev(self) -> Block {
        assert!(self.is_prev_free(), "previous block must be free to follow the back link");

        let prev = unsafe {
            self.field::<Option<Block>>(offset_of!(BlockHeader, prev_phys_block))
                .read()
        };
        match prev {
            Some(prev) => prev,
            None => panic!("free predecessor of block {:#x} has no back link", self.addr()),
        }
    }

    #[inline]
    fn set_prev_phys(self, prev: Block) {
        unsafe {
            self.field::<Option<Block>>(offset_of!(BlockHeader, prev_phys_block))
                .write(Some(prev))
        }
    }

    /// The block physically after this one. Never called on the sentinel.
    #[inline]
    pub fn next(self) -> Block {
        debug_assert!(!self.is_last(), "the pool sentinel has no successor");
        let header = self
            .to_ptr()
            .as_ptr()
            .wrapping_add(self.size())
            .wrapping_sub(mem::size_of::<usize>());

        // SAFETY: the successor of a non sentinel block is inside the same pool.
        unsafe { Self(NonNull::new_unchecked(header.cast())) }
    }

    /// Stores the back link of the next block and returns that block.
    #[inline]
    pub fn link_next(self) -> Block {
        let next = self.next();
        next.set_prev_phys(self);
        next
    }

    /// Flags the block as free and tells its successor about it.
    #[inline]
    pub fn mark_as_free(self) {
        let next = self.link_next();
        next.set_prev_free();
        self.set_free();
    }

    /// Flags the block as used and tells its successor about it.
    #[inline]
    pub fn mark_as_used(self) {
        let next = self.next();
        next.set_prev_used();
        self.set_used();
    }

    #[inline]
    pub fn next_free(self) -> Option<Block> {
        unsafe { self.field::<Option<Block>>(offset_of!(BlockHeader, next_free)).read() }
    }

    #[inline]
    pub fn set_next_free(self, block: Option<Block>) {
        unsafe { self.field::<Option<Block>>(offset_of!(BlockHeader, next_free)).write(block) }
    }

    #[inline]
    pub fn prev_free(self) -> Option<Block> {
        unsafe { self.field::<Option<Block>>(offset_of!(BlockHeader, prev_free)).read() }
    }

    #[inline]
    pub fn set_prev_free_link(self, block: Option<Block>) {
        unsafe { self.field::<Option<Block>>(offset_of!(BlockHeader, prev_free)).write(block) }
    }

    /// Whether `size` bytes can be carved from this block leaving a valid
    /// free block behind.
    #[inline]
    pub fn can_split(self, size: usize) -> bool {
        self.size() >= mem::size_of::<BlockHeader>() + size
    }

    /// Splits the block at `size` and returns the trailing remainder, which is
    /// left marked free but is not linked into any free list.
    ///
    /// ```text
    /// +--------+---------------------------------+
    /// | header |            size(block)          |
    /// +--------+---------------------------------+
    ///                      |
    ///                      v
    /// +--------+----------+--------+-------------+
    /// | header |   size   | header |  remaining  |
    /// +--------+----------+--------+-------------+
    /// ```
    pub fn split(self, size: usize) -> Block {
        let remaining = {
            let header = self
                .to_ptr()
                .as_ptr()
                .wrapping_add(size)
                .wrapping_sub(mem::size_of::<usize>());
            // SAFETY: the split point lies inside this block.
            unsafe { Self(NonNull::new_unchecked(header.cast())) }
        };
        let remain_size = self.size() - (size + ALLOC_OVERHEAD);

        debug_assert!(
            remaining.to_ptr().as_ptr() as usize % ALIGN_SIZE == 0,
            "remaining block not aligned properly"
        );
        debug_assert!(self.size() == remain_size + size + ALLOC_OVERHEAD);
        debug_assert!(remain_size >= BLOCK_SIZE_MIN, "block split with invalid size");

        remaining.set_size(remain_size);
        remaining.set_flags(BlockFlags::empty());
        self.set_size(size);
        remaining.mark_as_free();

        remaining
    }

    /// Merges the physically following block `next` into `self`.
    pub fn absorb(self, next: Block) -> Block {
        debug_assert!(!self.is_last(), "previous block can't be last");
        self.set_size(self.size() + next.size() + ALLOC_OVERHEAD);
        self.link_next();
        self
    }
}

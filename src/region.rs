use std::{mem, ptr::NonNull};

use log::{debug, warn};

use crate::{
    block::{Block, BlockFlags},
    config::{ALIGN_SIZE, BLOCK_SIZE_MAX, BLOCK_SIZE_MIN, POOL_OVERHEAD},
    error::TlsfError,
    freelist::Control,
    mapping::classify,
    utils::{align_down, is_aligned},
};

/// Handle to a memory region registered with the allocator.
///
/// The allocator never grows a pool nor asks the system for more memory.
/// A registered region is turned into one big free block closed by a zero
/// sized sentinel that always looks used:
///
/// ```text
///        pool start                                        pool end
///            |                                                 |
///  +---------+-------+----------------------------+------+-----+
///  |prev_phys| size  |                            | size |     |
///  | (out of | flags |      free payload          | flags| pad |
///  |  pool)  |       |                            |      |     |
///  +---------+-------+----------------------------+------+-----+
///  ^ first block                         sentinel ^
/// ```
///
/// The first block is never "prev free", so its back link, which lies just
/// before the pool, is never read. The sentinel is never free, so no merge
/// ever walks past the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool(NonNull<u8>);

/// A block as reported by [`Tlsf::walk_pool`](crate::Tlsf::walk_pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Start of the block payload.
    pub ptr: NonNull<u8>,
    /// Payload capacity in bytes.
    pub size: usize,
    /// Whether the block is handed out.
    pub used: bool,
}

impl Pool {
    /// Start of the region the pool was created from.
    #[inline]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// The first block is offset by one word so its back link lies just
    /// outside the pool.
    pub(crate) fn first_block(self) -> Block {
        let header = self.0.as_ptr().wrapping_sub(mem::size_of::<usize>());
        // SAFETY: pools are created from aligned, non null addresses well
        // above the first page.
        unsafe { Block::from_header(NonNull::new_unchecked(header)) }
    }

    /// Iterates every block of the pool in address order, sentinel excluded.
    ///
    /// **SAFETY**: the pool must still be registered.
    pub(crate) unsafe fn blocks(self) -> impl Iterator<Item = Block> {
        let mut current = Some(self.first_block());

        std::iter::from_fn(move || {
            let block = current.filter(|block| !block.is_last())?;
            current = Some(block.next());
            Some(block)
        })
    }

    /// Calls `walker` for every block of the pool.
    ///
    /// **SAFETY**: the pool must still be registered.
    pub(crate) unsafe fn walk<F>(self, mut walker: F)
    where
        F: FnMut(BlockInfo),
    {
        for block in unsafe { self.blocks() } {
            walker(BlockInfo {
                ptr: block.to_ptr(),
                size: block.size(),
                used: !block.is_free(),
            });
        }
    }
}

impl Control {
    /// Registers `bytes` bytes at `mem` as a new pool.
    ///
    /// **SAFETY**: the region must be valid for reads and writes, must not
    /// overlap any other pool nor the control structure and must stay alive
    /// and untouched by the caller until the pool is removed.
    pub(crate) unsafe fn add_pool(
        &mut self,
        mem: NonNull<u8>,
        bytes: usize,
    ) -> Result<Pool, TlsfError> {
        let addr = mem.as_ptr() as usize;

        if !is_aligned(addr, ALIGN_SIZE) {
            warn!("add_pool: memory must be aligned by {ALIGN_SIZE} bytes, got {addr:#x}");
            return Err(TlsfError::Misaligned { addr, align: ALIGN_SIZE });
        }

        let pool_bytes = align_down(bytes.saturating_sub(POOL_OVERHEAD), ALIGN_SIZE);

        if !(BLOCK_SIZE_MIN..BLOCK_SIZE_MAX).contains(&pool_bytes) {
            warn!(
                "add_pool: memory size must be between {} and {} bytes, got {bytes}",
                BLOCK_SIZE_MIN + POOL_OVERHEAD,
                BLOCK_SIZE_MAX + POOL_OVERHEAD,
            );
            return Err(TlsfError::PoolSize {
                bytes: pool_bytes,
                min: BLOCK_SIZE_MIN,
                max: BLOCK_SIZE_MAX,
            });
        }

        let pool = Pool(mem);

        // Create the main free block. The "prev used" flag keeps anything
        // from following its back link out of the pool.
        let block = pool.first_block();
        block.set_size(pool_bytes);
        block.set_flags(BlockFlags::FREE);
        self.insert(block);

        // Split the block to create a zero-size sentinel block.
        let sentinel = block.link_next();
        sentinel.set_size(0);
        sentinel.set_flags(BlockFlags::PREV_FREE);

        debug!("add_pool: registered {pool_bytes} usable bytes at {addr:#x}");

        Ok(pool)
    }

    /// Unregisters `pool`.
    ///
    /// **SAFETY**: every allocation made from the pool must have been freed,
    /// so the pool is back to a single free block.
    pub(crate) unsafe fn remove_pool(&mut self, pool: Pool) {
        let block = pool.first_block();

        debug_assert!(block.is_free(), "block should be free");
        debug_assert!(!block.next().is_free(), "next block should not be free");
        debug_assert!(block.next().is_last(), "next block size should be zero");

        let (fl, sl) = classify(block.size());
        self.remove_free_block(block, fl, sl);

        debug!("remove_pool: released pool at {:#x}", pool.as_ptr() as usize);
    }
}

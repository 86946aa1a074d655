use std::{fmt, marker::PhantomData, mem, ptr, ptr::NonNull};

use log::{debug, trace, warn};

use crate::{
    block::{Block, BlockHeader},
    config::{ALIGN_SIZE, ALLOC_OVERHEAD, BLOCK_SIZE_MAX, BLOCK_SIZE_MIN, CONTROL_SIZE},
    error::{IntegrityError, TlsfError},
    freelist::Control,
    region::{BlockInfo, Pool},
    utils::{align_ptr, align_up, is_aligned},
};

/// Two-Level Segregated Fit allocator.
///
/// The allocator manages memory it is given and nothing else. Its control
/// structure lives at the start of the first region handed to
/// [`Tlsf::create`] or [`Tlsf::create_with_pool`], and any number of pools
/// can be attached later with [`Tlsf::add_pool`].
///
/// ```text
///            Tlsf
///             |
///             v
/// +---------------------+      +----------------------------------------+
/// | Control             |      | Pool                                   |
/// |  fl_bitmap          |      | +------+------+------+------+--------+ |
/// |  sl_bitmap[fl]      | ---> | | Used | Free | Used | Free | sentry | |
/// |  blocks[fl][sl]     |      | +------+------+------+------+--------+ |
/// +---------------------+      +----------------------------------------+
/// ```
///
/// Every operation runs in bounded time: finding a block is two bit scans,
/// splitting and merging touch a fixed number of neighbours.
///
/// The allocator does no locking of its own. It is `Send` but not `Sync`;
/// sharing one between threads takes an external lock, see
/// [`LockedHeap`](crate::LockedHeap).
pub struct Tlsf<'pool> {
    control: NonNull<Control>,
    /// Pool registered along with the control structure, if any.
    pool: Option<Pool>,
    marker: PhantomData<&'pool mut [u8]>,
}

// The allocator exclusively owns the control structure and its pools.
unsafe impl Send for Tlsf<'_> {}

/// Rounds a request up to the allocation granularity and the minimum block
/// size. Returns `None` for empty requests and for sizes no pool could hold.
fn adjust_request_size(size: usize, align: usize) -> Option<usize> {
    if size == 0 || size >= BLOCK_SIZE_MAX {
        return None;
    }

    let aligned = align_up(size, align);

    // Aligned sizes must not exceed the maximum or we'd go out of bounds on
    // the second level bitmap.
    (aligned < BLOCK_SIZE_MAX).then(|| aligned.max(BLOCK_SIZE_MIN))
}

impl<'pool> Tlsf<'pool> {
    /// Builds an allocator whose control structure lives at `mem`. No pool
    /// is attached yet.
    ///
    /// **SAFETY**: `mem` must be valid for reads and writes of
    /// [`CONTROL_SIZE`] bytes for `'pool` and must not be used by anyone else
    /// while the allocator is alive.
    pub unsafe fn create(mem: NonNull<u8>) -> Result<Self, TlsfError> {
        let addr = mem.as_ptr() as usize;

        if !is_aligned(addr, ALIGN_SIZE) {
            warn!("create: memory must be aligned to {ALIGN_SIZE} bytes, got {addr:#x}");
            return Err(TlsfError::Misaligned { addr, align: ALIGN_SIZE });
        }

        let control = mem.cast::<Control>();
        unsafe { control.as_ptr().write(Control::new()) };

        debug!("create: control structure of {CONTROL_SIZE} bytes at {addr:#x}");

        Ok(Self {
            control,
            pool: None,
            marker: PhantomData,
        })
    }

    /// Builds an allocator at the start of `mem` and turns the rest of it
    /// into the first pool.
    ///
    /// ```text
    /// +--------------+--------------------------------------------+
    /// | CONTROL_SIZE |                  pool                      |
    /// +--------------+--------------------------------------------+
    /// ^ mem          ^ get_pool()
    /// ```
    pub fn create_with_pool(mem: &'pool mut [u8]) -> Result<Self, TlsfError> {
        let bytes = mem.len();

        if bytes < CONTROL_SIZE {
            warn!("create_with_pool: {bytes} bytes can't even hold the control structure");
            return Err(TlsfError::RegionTooSmall {
                bytes,
                needed: CONTROL_SIZE,
            });
        }

        let base = NonNull::from(mem).cast::<u8>();

        unsafe {
            let mut tlsf = Self::create(base)?;
            let pool = tlsf.add_pool_ptr(base.add(CONTROL_SIZE), bytes - CONTROL_SIZE)?;
            tlsf.pool = Some(pool);
            Ok(tlsf)
        }
    }

    /// The pool registered by [`Tlsf::create_with_pool`].
    ///
    /// `None` for an allocator built with [`Tlsf::create`], or once that
    /// pool has been removed.
    pub fn get_pool(&self) -> Option<Pool> {
        self.pool
    }

    #[inline]
    fn control(&self) -> &Control {
        unsafe { self.control.as_ref() }
    }

    #[inline]
    fn control_mut(&mut self) -> &mut Control {
        unsafe { self.control.as_mut() }
    }

    /// Attaches `mem` as an additional pool.
    pub fn add_pool(&mut self, mem: &'pool mut [u8]) -> Result<Pool, TlsfError> {
        let bytes = mem.len();
        let base = NonNull::from(mem).cast::<u8>();

        unsafe { self.add_pool_ptr(base, bytes) }
    }

    /// Attaches `bytes` bytes at `mem` as an additional pool.
    ///
    /// **SAFETY**: the region must be valid for reads and writes for `'pool`,
    /// must not overlap the control structure or any other pool and must not
    /// be touched by anyone else while it is registered.
    pub unsafe fn add_pool_ptr(
        &mut self,
        mem: NonNull<u8>,
        bytes: usize,
    ) -> Result<Pool, TlsfError> {
        unsafe { self.control_mut().add_pool(mem, bytes) }
    }

    /// Detaches `pool`. Its memory is the caller's again afterwards.
    ///
    /// **SAFETY**: `pool` must have been added to this allocator and every
    /// allocation made from it must have been freed.
    pub unsafe fn remove_pool(&mut self, pool: Pool) {
        unsafe { self.control_mut().remove_pool(pool) };

        if self.pool == Some(pool) {
            self.pool = None;
        }
    }

    fn prepare_used(&mut self, block: Option<Block>, size: usize) -> Option<NonNull<u8>> {
        let block = block?;
        debug_assert!(size != 0, "size must be non-zero");

        self.control_mut().trim_free(block, size);
        block.mark_as_used();

        Some(block.to_ptr())
    }

    /// Allocates `size` bytes aligned to [`ALIGN_SIZE`].
    ///
    /// Returns `None` for `size == 0` and when no free block is large enough.
    pub fn malloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let adjust = adjust_request_size(size, ALIGN_SIZE)?;
        let block = self.control_mut().locate_free(adjust);

        self.prepare_used(block, adjust)
    }

    /// Allocates `size` bytes aligned to `align`, which must be a power of two.
    pub fn memalign(&mut self, align: usize, size: usize) -> Option<NonNull<u8>> {
        if !align.is_power_of_two() {
            warn!("memalign: alignment {align} is not a power of two");
            return None;
        }

        let adjust = adjust_request_size(size, ALIGN_SIZE)?;

        // A misaligned payload is fixed by giving a leading piece of the block
        // back to the registry. That piece must be a valid free block itself,
        // since the block before it may be in use and its back link can't be
        // used to grow that one instead.
        let gap_minimum = mem::size_of::<BlockHeader>();

        // If alignment is less than or equal to base alignment, we're done.
        let aligned_size = if align > ALIGN_SIZE {
            adjust
                .max(gap_minimum)
                .checked_add(align)
                .and_then(|size| size.checked_add(gap_minimum))
                .and_then(|size| adjust_request_size(size, align))?
        } else {
            adjust
        };

        let mut block = self.control_mut().locate_free(aligned_size);

        if let Some(found) = block {
            let ptr = found.to_ptr().as_ptr();
            let mut aligned = align_ptr(ptr, align);
            let mut gap = aligned as usize - ptr as usize;

            // If gap size is too small, offset to next aligned boundary.
            if gap != 0 && gap < gap_minimum {
                let gap_remain = gap_minimum - gap;
                let offset = gap_remain.max(align);
                aligned = align_ptr(aligned.wrapping_add(offset), align);
                gap = aligned as usize - ptr as usize;
            }

            if gap != 0 {
                trace!("memalign: giving back a leading gap of {gap} bytes");
                block = Some(self.control_mut().trim_free_leading(found, gap));
            }
        }

        let ptr = self.prepare_used(block, adjust)?;
        debug_assert!(
            is_aligned(ptr.as_ptr() as usize, align),
            "memalign returned a misaligned block"
        );

        Some(ptr)
    }

    /// Returns the block at `ptr` to the allocator. `None` is a no-op.
    ///
    /// **SAFETY**: `ptr` must come from this allocator and must not have been
    /// freed already.
    pub unsafe fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            return;
        };

        let block = unsafe { Block::from_ptr(ptr) };
        debug_assert!(!block.is_free(), "block already marked as free");

        block.mark_as_free();

        let control = self.control_mut();
        let block = control.merge_with_prev(block);
        let block = control.merge_with_next(block);
        control.insert(block);
    }

    /// Resizes the allocation at `ptr` to `size` bytes.
    ///
    /// - `ptr == None` behaves as [`malloc`](Self::malloc).
    /// - `size == 0` frees `ptr` and returns `None`.
    /// - If the block, together with a free block right after it, is large
    ///   enough it is resized in place and `ptr` is returned.
    /// - Otherwise the contents move to a new block. If that allocation fails
    ///   `None` is returned and `ptr` stays valid and untouched.
    ///
    /// The block never grows into a free block physically before it, so a
    /// move happens even if merging backwards would have been enough.
    ///
    /// **SAFETY**: `ptr` must come from this allocator and be live.
    pub unsafe fn realloc(&mut self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        let Some(ptr) = ptr else {
            // Requests with no pointer are treated as malloc.
            return self.malloc(size);
        };

        if size == 0 {
            // Zero-size requests are treated as free.
            unsafe { self.free(Some(ptr)) };
            return None;
        }

        if adjust_request_size(size, ALIGN_SIZE).is_none() {
            trace!("realloc: {size} bytes is more than any block can hold");
            return None;
        }

        if let Some(ptr) = unsafe { self.resize_in_place(ptr, size) } {
            return Some(ptr);
        }

        // The block and its successor can't hold `size`, reallocate and copy.
        let cursize = unsafe { self.block_size(ptr) };
        let moved = self.malloc(size)?;

        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), cursize.min(size));
            self.free(Some(ptr));
        }

        Some(moved)
    }

    /// Resizes the block at `ptr` to `size` bytes without moving it.
    ///
    /// Returns `None` and leaves the block untouched when neither the block
    /// nor the block plus a free successor can hold `size`.
    ///
    /// **SAFETY**: `ptr` must come from this allocator and be live.
    pub(crate) unsafe fn resize_in_place(
        &mut self,
        ptr: NonNull<u8>,
        size: usize,
    ) -> Option<NonNull<u8>> {
        let adjust = adjust_request_size(size, ALIGN_SIZE)?;

        let block = unsafe { Block::from_ptr(ptr) };
        debug_assert!(!block.is_free(), "block already marked as free");

        let next = block.next();
        let cursize = block.size();

        // Do we need to expand to the next block?
        if adjust > cursize {
            let combined = cursize + next.size() + ALLOC_OVERHEAD;
            if !next.is_free() || adjust > combined {
                return None;
            }

            self.control_mut().merge_with_next(block);
            block.mark_as_used();
        }

        // Trim the resulting block and return the original pointer.
        self.control_mut().trim_used(block, adjust);

        Some(ptr)
    }

    /// Usable bytes of the allocation at `ptr`. Can be more than requested.
    ///
    /// **SAFETY**: `ptr` must come from this allocator and be live.
    pub unsafe fn block_size(&self, ptr: NonNull<u8>) -> usize {
        unsafe { Block::from_ptr(ptr) }.size()
    }

    /// Calls `walker` for every block of `pool` in address order.
    ///
    /// **SAFETY**: `pool` must be registered with this allocator.
    pub unsafe fn walk_pool<F>(&self, pool: Pool, walker: F)
    where
        F: FnMut(BlockInfo),
    {
        unsafe { pool.walk(walker) }
    }

    /// Verifies the free lists against the bitmaps and the blocks they hold.
    pub fn check(&self) -> Result<(), IntegrityError> {
        self.control().check()
    }

    /// Verifies the physical chain of blocks in `pool`.
    ///
    /// **SAFETY**: `pool` must be registered with this allocator.
    pub unsafe fn check_pool(&self, pool: Pool) -> Result<(), IntegrityError> {
        unsafe { Control::check_pool(pool) }
    }
}

impl fmt::Debug for Tlsf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tlsf")
            .field("control", &self.control)
            .field("fl_bitmap", &format_args!("{:#b}", self.control().fl_bitmap()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::POOL_OVERHEAD, kernel::MappedRegion};
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use test_log::test;

    const KIB: usize = 1024;

    fn free_blocks(tlsf: &Tlsf<'_>, pool: Pool) -> Vec<(usize, usize)> {
        let mut free = Vec::new();
        unsafe {
            tlsf.walk_pool(pool, |info| {
                if !info.used {
                    free.push((info.ptr.as_ptr() as usize, info.size))
                }
            })
        };
        free
    }

    fn accounted_bytes(tlsf: &Tlsf<'_>, pool: Pool) -> usize {
        let mut total = 0;
        unsafe { tlsf.walk_pool(pool, |info| total += info.size + ALLOC_OVERHEAD) };
        total
    }

    fn assert_consistent(tlsf: &Tlsf<'_>, pool: Pool) {
        tlsf.check().unwrap();
        unsafe { tlsf.check_pool(pool) }.unwrap();
    }

    #[test]
    fn malloc_free_reuses_the_same_address() {
        let mut region = MappedRegion::new(64 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(&mut region.as_mut_slice()[..64 * KIB]).unwrap();

        let first = tlsf.malloc(100).unwrap();
        assert!(is_aligned(first.as_ptr() as usize, 8));

        unsafe { tlsf.free(Some(first)) };
        let second = tlsf.malloc(100).unwrap();

        assert_eq!(first, second);
        assert_consistent(&tlsf, tlsf.get_pool().unwrap());
    }

    #[test]
    fn exhaustion_leaves_the_pool_untouched() {
        let mut region = MappedRegion::new(64 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(&mut region.as_mut_slice()[..64 * KIB]).unwrap();
        let pool = tlsf.get_pool().unwrap();
        let _live = tlsf.malloc(100).unwrap();

        let before = free_blocks(&tlsf, pool);
        assert!(tlsf.malloc(70000).is_none());

        assert_eq!(free_blocks(&tlsf, pool), before);
        assert_consistent(&tlsf, pool);
    }

    #[test]
    fn memalign_after_free() {
        let mut region = MappedRegion::new(64 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();

        let _a = tlsf.malloc(16).unwrap();
        let b = tlsf.malloc(32).unwrap();
        let _c = tlsf.malloc(64).unwrap();
        unsafe { tlsf.free(Some(b)) };

        let aligned = tlsf.memalign(64, 16).unwrap();

        assert!(is_aligned(aligned.as_ptr() as usize, 64));
        assert!(unsafe { tlsf.block_size(aligned) } >= 16);
        assert_consistent(&tlsf, tlsf.get_pool().unwrap());
    }

    #[test]
    fn conservation_holds_through_a_workload() {
        let mut region = MappedRegion::new(256 * KIB).unwrap();
        let len = region.len();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
        let pool = tlsf.get_pool().unwrap();
        let registered = len - CONTROL_SIZE - POOL_OVERHEAD + ALLOC_OVERHEAD;

        assert_eq!(accounted_bytes(&tlsf, pool), registered);

        let mut rng = StdRng::seed_from_u64(7);
        let mut live = Vec::new();

        for round in 0..2000 {
            if live.is_empty() || rng.gen_bool(0.6) {
                if let Some(ptr) = tlsf.malloc(rng.gen_range(1..2048)) {
                    live.push(ptr);
                }
            } else {
                let victim = live.swap_remove(rng.gen_range(0..live.len()));
                unsafe { tlsf.free(Some(victim)) };
            }

            if round % 100 == 0 {
                assert_eq!(accounted_bytes(&tlsf, pool), registered);
                assert_consistent(&tlsf, pool);
            }
        }

        for ptr in live {
            unsafe { tlsf.free(Some(ptr)) };
        }

        assert_eq!(free_blocks(&tlsf, pool).len(), 1);
        assert_eq!(accounted_bytes(&tlsf, pool), registered);
    }

    #[test]
    fn adjacent_frees_coalesce() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
        let pool = tlsf.get_pool().unwrap();

        // Carve the whole pool into equal blocks so the merged space is the
        // only way to satisfy a bigger request.
        let mut blocks = Vec::new();
        while let Some(ptr) = tlsf.malloc(128) {
            blocks.push(ptr);
        }
        assert!(blocks.len() > 4);

        // Free in reverse physical order.
        unsafe {
            tlsf.free(Some(blocks[2]));
            tlsf.free(Some(blocks[1]));
        }

        let merged = tlsf.malloc(2 * 128 + ALLOC_OVERHEAD).unwrap();
        assert_eq!(merged, blocks[1]);

        blocks.remove(2);
        for ptr in blocks {
            unsafe { tlsf.free(Some(ptr)) };
        }

        assert_eq!(free_blocks(&tlsf, pool).len(), 1);
        assert_consistent(&tlsf, pool);
    }

    #[test]
    fn zero_and_oversized_requests_fail() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();

        assert!(tlsf.malloc(0).is_none());
        assert!(tlsf.malloc(BLOCK_SIZE_MAX).is_none());
        assert!(tlsf.malloc(usize::MAX).is_none());
        assert!(tlsf.memalign(64, 0).is_none());
        assert!(tlsf.memalign(48, 16).is_none());
        assert!(tlsf.memalign(0, 16).is_none());
        assert!(tlsf.memalign(1 << (usize::BITS - 1), 16).is_none());
    }

    #[test]
    fn small_requests_get_the_minimum_block() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();

        let ptr = tlsf.malloc(1).unwrap();
        assert_eq!(unsafe { tlsf.block_size(ptr) }, BLOCK_SIZE_MIN);

        let ptr = tlsf.malloc(25).unwrap();
        assert_eq!(unsafe { tlsf.block_size(ptr) }, 32);
    }

    #[test]
    fn realloc_identities() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
        let pool = tlsf.get_pool().unwrap();
        let pristine = free_blocks(&tlsf, pool);

        // realloc(None, n) == malloc(n)
        let ptr = unsafe { tlsf.realloc(None, 200) }.unwrap();
        let size = unsafe { tlsf.block_size(ptr) };
        assert!(size >= 200);

        // Shrinking or keeping the size stays in place.
        assert_eq!(unsafe { tlsf.realloc(Some(ptr), size) }, Some(ptr));
        assert_eq!(unsafe { tlsf.realloc(Some(ptr), 10) }, Some(ptr));

        // realloc(p, 0) == free(p)
        assert_eq!(unsafe { tlsf.realloc(Some(ptr), 0) }, None);
        assert_eq!(free_blocks(&tlsf, pool), pristine);
    }

    #[test]
    fn realloc_grows_in_place_into_a_free_successor() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();

        let ptr = tlsf.malloc(64).unwrap();
        unsafe { ptr.as_ptr().write_bytes(0x5A, 64) };

        let grown = unsafe { tlsf.realloc(Some(ptr), 1024) }.unwrap();

        assert_eq!(grown, ptr);
        assert!(unsafe { tlsf.block_size(grown) } >= 1024);
        let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0x5A));
        assert_consistent(&tlsf, tlsf.get_pool().unwrap());
    }

    #[test]
    fn realloc_moves_when_blocked() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();

        let ptr = tlsf.malloc(64).unwrap();
        let _fence = tlsf.malloc(64).unwrap();
        for i in 0..64 {
            unsafe { ptr.as_ptr().add(i).write(i as u8) };
        }

        let moved = unsafe { tlsf.realloc(Some(ptr), 512) }.unwrap();

        assert_ne!(moved, ptr);
        let bytes = unsafe { std::slice::from_raw_parts(moved.as_ptr(), 64) };
        assert!(bytes.iter().enumerate().all(|(i, &b)| b == i as u8));
        assert_consistent(&tlsf, tlsf.get_pool().unwrap());
    }

    #[test]
    fn failed_realloc_keeps_the_original() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();

        let ptr = tlsf.malloc(64).unwrap();
        let _fence = tlsf.malloc(64).unwrap();
        unsafe { ptr.as_ptr().write_bytes(0x77, 64) };

        assert!(unsafe { tlsf.realloc(Some(ptr), 1 << 20) }.is_none());
        assert!(unsafe { tlsf.realloc(Some(ptr), usize::MAX) }.is_none());

        assert_eq!(unsafe { tlsf.block_size(ptr) }, 64);
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0x77));
        assert_consistent(&tlsf, tlsf.get_pool().unwrap());
    }

    #[test]
    fn memalign_honours_every_alignment() {
        let mut region = MappedRegion::new(1024 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
        let pool = tlsf.get_pool().unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for shift in 0..13 {
            let align = 1 << shift;
            let mut live = Vec::new();

            for _ in 0..16 {
                let size = rng.gen_range(1..512);
                let ptr = tlsf.memalign(align, size).unwrap();

                assert!(is_aligned(ptr.as_ptr() as usize, align), "{ptr:?} not aligned to {align}");
                assert!(unsafe { tlsf.block_size(ptr) } >= size);
                live.push(ptr);

                // Shift the next candidate block by a small used block.
                live.push(tlsf.malloc(rng.gen_range(1..64)).unwrap());
            }

            assert_consistent(&tlsf, pool);
            for ptr in live {
                unsafe { tlsf.free(Some(ptr)) };
            }
        }

        assert_eq!(free_blocks(&tlsf, pool).len(), 1);
    }

    #[test]
    fn create_rejects_bad_regions() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let bytes = region.as_mut_slice();

        let err = Tlsf::create_with_pool(&mut bytes[..CONTROL_SIZE - 1]).unwrap_err();
        assert_eq!(err, TlsfError::RegionTooSmall { bytes: CONTROL_SIZE - 1, needed: CONTROL_SIZE });

        let err = Tlsf::create_with_pool(&mut bytes[..CONTROL_SIZE + 8]).unwrap_err();
        assert!(matches!(err, TlsfError::PoolSize { .. }));

        let err = Tlsf::create_with_pool(&mut bytes[1..]).unwrap_err();
        assert!(matches!(err, TlsfError::Misaligned { align: ALIGN_SIZE, .. }));
    }

    #[test]
    fn create_without_pool_has_nothing_to_give() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = unsafe { Tlsf::create(region.as_ptr()) }.unwrap();

        assert!(tlsf.get_pool().is_none());
        assert!(tlsf.malloc(16).is_none());
        tlsf.check().unwrap();
    }

    #[test]
    fn removing_the_initial_pool_forgets_it() {
        let mut region = MappedRegion::new(16 * KIB).unwrap();
        let mut tlsf = Tlsf::create_with_pool(region.as_mut_slice()).unwrap();
        let pool = tlsf.get_pool().unwrap();

        unsafe { tlsf.remove_pool(pool) };

        assert!(tlsf.get_pool().is_none());
        assert!(tlsf.malloc(16).is_none());
        tlsf.check().unwrap();
    }
}

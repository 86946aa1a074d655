use log::trace;

use crate::{
    block::Block,
    config::{ALIGN_SIZE, FL_INDEX_COUNT, FlBitmap, SL_INDEX_COUNT, SlBitmap},
    list::FreeList,
    mapping::{classify, search_round},
};

/// The free list registry, also called the control structure.
///
/// It keeps one [`FreeList`] per `(fl, sl)` class and two levels of bitmaps
/// telling which of those lists are non empty:
///
/// ```text
/// fl_bitmap    0 0 1 0 1 ...            one bit per first level class
///                  |   |
///                  |   +--> sl_bitmap[4]  0 1 0 ... 0 1
///                  |                        |         |
///                  +------> sl_bitmap[2]    |         +--> blocks[4][31]: Free -> Free
///                                           +------------> blocks[4][1]:  Free
/// ```
///
/// A bit is set exactly when the corresponding list holds at least one
/// block, so finding a non empty list of a given class or bigger only takes
/// two bit scans, independent of how many blocks exist.
///
/// The structure is written by [`Tlsf::create`](crate::Tlsf::create) at the
/// start of caller memory and never moves afterwards.
#[repr(C)]
pub(crate) struct Control {
    fl_bitmap: FlBitmap,
    sl_bitmap: [SlBitmap; FL_INDEX_COUNT],
    blocks: [[FreeList; SL_INDEX_COUNT]; FL_INDEX_COUNT],
}

impl Control {
    /// Creates a registry with every list empty.
    pub const fn new() -> Self {
        Self {
            fl_bitmap: 0,
            sl_bitmap: [0; FL_INDEX_COUNT],
            blocks: [[FreeList::new(); SL_INDEX_COUNT]; FL_INDEX_COUNT],
        }
    }

    #[inline]
    pub fn fl_bitmap(&self) -> FlBitmap {
        self.fl_bitmap
    }

    #[inline]
    pub fn sl_bitmap(&self, fl: usize) -> SlBitmap {
        self.sl_bitmap[fl]
    }

    #[inline]
    pub fn list(&self, fl: usize, sl: usize) -> &FreeList {
        &self.blocks[fl][sl]
    }

    /// Files a free `block` under the list of its size class.
    pub fn insert(&mut self, block: Block) {
        let (fl, sl) = classify(block.size());
        self.insert_free_block(block, fl, sl);
    }

    /// Takes a free `block` out of the list of its size class.
    pub fn remove(&mut self, block: Block) {
        let (fl, sl) = classify(block.size());
        self.remove_free_block(block, fl, sl);
    }

    pub fn insert_free_block(&mut self, block: Block, fl: usize, sl: usize) {
        debug_assert!(
            block.to_ptr().as_ptr() as usize % ALIGN_SIZE == 0,
            "block not aligned properly"
        );

        self.blocks[fl][sl].push_front(block);

        self.fl_bitmap |= 1 << fl;
        self.sl_bitmap[fl] |= 1 << sl;
    }

    pub fn remove_free_block(&mut self, block: Block, fl: usize, sl: usize) {
        let list = &mut self.blocks[fl][sl];
        list.remove(block);

        if list.is_empty() {
            self.sl_bitmap[fl] &= !(1 << sl);

            // If the second level bitmap is empty, clear the fl bit.
            if self.sl_bitmap[fl] == 0 {
                self.fl_bitmap &= !(1 << fl);
            }
        }
    }

    /// Finds the first non empty list of class `(fl, sl)` or above and
    /// returns its head along with the class it was found in.
    pub fn find_suitable(&self, fl: usize, sl: usize) -> Option<(Block, usize, usize)> {
        // First, search for a block in the list associated with the given
        // fl/sl index.
        let mut fl = fl;
        let mut sl_map = self.sl_bitmap[fl] & (!0 << sl);

        if sl_map == 0 {
            // No block exists. Search in the next largest first-level list.
            let fl_map = self.fl_bitmap & shifted_mask(fl + 1);
            if fl_map == 0 {
                // No free blocks available, memory has been exhausted.
                return None;
            }

            fl = fl_map.trailing_zeros() as usize;
            sl_map = self.sl_bitmap[fl];
        }

        debug_assert!(sl_map != 0, "second level bitmap is null");
        let sl = sl_map.trailing_zeros() as usize;

        self.blocks[fl][sl].first().map(|block| (block, fl, sl))
    }

    /// Removes and returns a free block of at least `size` bytes.
    ///
    /// `size` must already be adjusted to the allocation granularity.
    pub fn locate_free(&mut self, size: usize) -> Option<Block> {
        if size == 0 {
            return None;
        }

        let (fl, sl) = search_round(size);

        // Rounding a size close to the maximum can push it past the last
        // first level class.
        if fl >= FL_INDEX_COUNT {
            trace!("no class can hold {size} bytes");
            return None;
        }

        let Some((block, fl, sl)) = self.find_suitable(fl, sl) else {
            trace!("no free block of {size} bytes available");
            return None;
        };

        debug_assert!(block.size() >= size);
        self.remove_free_block(block, fl, sl);

        Some(block)
    }
}

/// `!0 << shift` without overflowing when `shift` is the full word width.
#[inline]
fn shifted_mask(shift: usize) -> FlBitmap {
    FlBitmap::MAX.checked_shl(shift as u32).unwrap_or(0)
}

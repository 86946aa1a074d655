//! Consistency checks over the registry and over pools.
//!
//! None of this runs on the allocation paths. Tests and debugging sessions
//! call it through [`Tlsf::check`](crate::Tlsf::check) and
//! [`Tlsf::check_pool`](crate::Tlsf::check_pool).

use crate::{
    config::{BLOCK_SIZE_MIN, FL_INDEX_COUNT, SL_INDEX_COUNT},
    error::IntegrityError,
    freelist::Control,
    mapping::classify,
    region::Pool,
};

impl Control {
    /// Walks every free list and verifies the bitmaps and the listed blocks.
    pub(crate) fn check(&self) -> Result<(), IntegrityError> {
        for fl in 0..FL_INDEX_COUNT {
            let fl_set = self.fl_bitmap() & (1 << fl) != 0;
            let sl_word = self.sl_bitmap(fl);

            if fl_set != (sl_word != 0) {
                return Err(IntegrityError::FirstLevelBitmap { fl });
            }

            for sl in 0..SL_INDEX_COUNT {
                let list = self.list(fl, sl);
                let sl_set = sl_word & (1 << sl) != 0;

                if sl_set == list.is_empty() {
                    return Err(IntegrityError::SecondLevelBitmap { fl, sl });
                }

                for block in list {
                    let addr = block.addr();
                    let size = block.size();

                    if !block.is_free() {
                        return Err(IntegrityError::ListedBlockUsed { addr, fl, sl });
                    }

                    if size < BLOCK_SIZE_MIN {
                        return Err(IntegrityError::BlockTooSmall { addr, size });
                    }

                    if classify(size) != (fl, sl) {
                        return Err(IntegrityError::WrongList { addr, size, fl, sl });
                    }

                    let next = block.next();
                    if block.is_prev_free() || next.is_free() {
                        return Err(IntegrityError::NotCoalesced { addr, fl, sl });
                    }

                    if !next.is_prev_free() {
                        return Err(IntegrityError::PrevFreeMismatch { addr: next.addr() });
                    }
                }
            }
        }

        Ok(())
    }

    /// Walks the physical chain of `pool`, sentinel included.
    ///
    /// **SAFETY**: the pool must still be registered.
    pub(crate) unsafe fn check_pool(pool: Pool) -> Result<(), IntegrityError> {
        let mut prev_free = false;
        let mut last = pool.first_block();

        for block in unsafe { pool.blocks() } {
            if block.is_prev_free() != prev_free {
                return Err(IntegrityError::PrevFreeMismatch { addr: block.addr() });
            }

            if prev_free && block.is_free() {
                return Err(IntegrityError::AdjacentFree { addr: block.addr() });
            }

            prev_free = block.is_free();
            last = block;
        }

        // The sentinel must agree with the last real block too.
        let sentinel = last.next();
        if sentinel.is_prev_free() != prev_free {
            return Err(IntegrityError::PrevFreeMismatch { addr: sentinel.addr() });
        }

        Ok(())
    }
}

use thiserror::Error;

/// Reasons the allocator refuses a configuration request or a [`Heap`](crate::Heap)
/// request.
///
/// The raw allocation entry points ([`Tlsf::malloc`](crate::Tlsf::malloc) and
/// friends) never return this type: running out of memory there is simply `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TlsfError {
    #[error("address {addr:#x} is not aligned to {align} bytes")]
    Misaligned { addr: usize, align: usize },

    #[error("pool of {bytes} usable bytes is outside the supported range [{min}, {max})")]
    PoolSize { bytes: usize, min: usize, max: usize },

    #[error("region of {bytes} bytes is too small, at least {needed} bytes are required")]
    RegionTooSmall { bytes: usize, needed: usize },

    #[error("alignment {0} is not a power of two")]
    InvalidAlign(usize),

    #[error("out of memory")]
    NoMemory,

    #[error("heap used before it was initialized")]
    Uninitialized,
}

/// Inconsistencies found by [`Tlsf::check`](crate::Tlsf::check) and
/// [`Tlsf::check_pool`](crate::Tlsf::check_pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("first level bit {fl} does not match its second level word")]
    FirstLevelBitmap { fl: usize },

    #[error("second level bit ({fl}, {sl}) does not match its list")]
    SecondLevelBitmap { fl: usize, sl: usize },

    #[error("block at {addr:#x} in list ({fl}, {sl}) is not marked free")]
    ListedBlockUsed { addr: usize, fl: usize, sl: usize },

    #[error("block at {addr:#x} in list ({fl}, {sl}) should have been coalesced")]
    NotCoalesced { addr: usize, fl: usize, sl: usize },

    #[error("block at {addr:#x} of {size} bytes is below the minimum block size")]
    BlockTooSmall { addr: usize, size: usize },

    #[error("block at {addr:#x} of {size} bytes is filed under the wrong list ({fl}, {sl})")]
    WrongList { addr: usize, size: usize, fl: usize, sl: usize },

    #[error("block at {addr:#x} disagrees with its predecessor about being free")]
    PrevFreeMismatch { addr: usize },

    #[error("block at {addr:#x} has a free physical neighbour")]
    AdjacentFree { addr: usize },
}

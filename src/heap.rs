use std::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::{
    config::{ALIGN_SIZE, ALLOC_OVERHEAD, CONTROL_SIZE, POOL_OVERHEAD},
    error::TlsfError,
    region::Pool,
    tlsf::Tlsf,
    utils::align_down,
};

/// A [`Layout`] driven heap on top of [`Tlsf`], keeping track of how many
/// bytes it manages and how many are handed out.
///
/// Requests aligned to at most [`ALIGN_SIZE`] go through
/// [`Tlsf::malloc`], anything stricter through [`Tlsf::memalign`].
///
/// `used_bytes` counts the usable size of every live block plus its
/// [`ALLOC_OVERHEAD`]. Each pool adds its usable capacity plus the header of
/// the one block spanning it to `total_bytes`, so a heap with every byte
/// handed out reports `used_bytes() == total_bytes()`.
pub struct Heap {
    tlsf: Option<Tlsf<'static>>,
    total_bytes: usize,
    used_bytes: usize,
}

/// Bytes a region of `bytes` bytes adds to the heap once registered as a
/// pool: what its blocks and their headers can cover at most.
fn pool_bytes(bytes: usize) -> usize {
    align_down(bytes - POOL_OVERHEAD, ALIGN_SIZE) + ALLOC_OVERHEAD
}

impl Heap {
    /// A heap with no memory. Every allocation fails until [`Heap::init`].
    pub const fn empty() -> Self {
        Self {
            tlsf: None,
            total_bytes: 0,
            used_bytes: 0,
        }
    }

    /// Places the allocator at `start` and gives it the rest of the region.
    ///
    /// **SAFETY**: `size` bytes at `start` must be valid for reads and writes
    /// and must outlive every use of the heap.
    pub unsafe fn init(&mut self, start: NonNull<u8>, size: usize) -> Result<(), TlsfError> {
        if size < CONTROL_SIZE {
            return Err(TlsfError::RegionTooSmall {
                bytes: size,
                needed: CONTROL_SIZE,
            });
        }

        let region_bytes = size - CONTROL_SIZE;
        let mut tlsf = unsafe { Tlsf::create(start)? };
        unsafe { tlsf.add_pool_ptr(start.add(CONTROL_SIZE), region_bytes)? };

        self.tlsf = Some(tlsf);
        self.total_bytes = pool_bytes(region_bytes);
        self.used_bytes = 0;

        debug!("heap initialized with {} bytes", self.total_bytes);

        Ok(())
    }

    /// Gives the heap another region to allocate from.
    ///
    /// **SAFETY**: same contract as [`Heap::init`], and the region must not
    /// overlap memory the heap already manages.
    pub unsafe fn add_memory(
        &mut self,
        start: NonNull<u8>,
        size: usize,
    ) -> Result<Pool, TlsfError> {
        let tlsf = self.tlsf.as_mut().ok_or(TlsfError::Uninitialized)?;
        let pool = unsafe { tlsf.add_pool_ptr(start, size)? };

        self.total_bytes += pool_bytes(size);

        Ok(pool)
    }

    fn tlsf(&mut self) -> Result<&mut Tlsf<'static>, TlsfError> {
        self.tlsf.as_mut().ok_or(TlsfError::Uninitialized)
    }

    pub fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, TlsfError> {
        // Zero sized requests still need a unique address.
        let size = layout.size().max(1);
        let tlsf = self.tlsf()?;

        let ptr = if layout.align() <= ALIGN_SIZE {
            tlsf.malloc(size)
        } else {
            tlsf.memalign(layout.align(), size)
        }
        .ok_or(TlsfError::NoMemory)?;

        let block_size = unsafe { tlsf.block_size(ptr) };
        self.used_bytes += block_size + ALLOC_OVERHEAD;

        Ok(ptr)
    }

    /// **SAFETY**: `ptr` must come from [`Heap::alloc`] or [`Heap::realloc`]
    /// on this heap and must not be used afterwards.
    pub unsafe fn dealloc(&mut self, ptr: NonNull<u8>, _layout: Layout) {
        let Some(tlsf) = self.tlsf.as_mut() else {
            return;
        };

        let block_size = unsafe { tlsf.block_size(ptr) };
        unsafe { tlsf.free(Some(ptr)) };

        self.used_bytes -= block_size + ALLOC_OVERHEAD;
    }

    /// Resizes the allocation at `ptr`, described by `layout`, to `new_size`.
    ///
    /// On error the original allocation is left as it was.
    ///
    /// **SAFETY**: same contract as [`Heap::dealloc`].
    pub unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, TlsfError> {
        let new_size = new_size.max(1);
        let tlsf = self.tlsf()?;
        let old_size = unsafe { tlsf.block_size(ptr) };

        let resized = if layout.align() <= ALIGN_SIZE {
            unsafe { tlsf.realloc(Some(ptr), new_size) }
        } else {
            // A block moved by the allocator is only ALIGN_SIZE aligned.
            unsafe { tlsf.resize_in_place(ptr, new_size) }
        };

        if let Some(resized) = resized {
            let resized_size = unsafe { tlsf.block_size(resized) };
            self.used_bytes = self.used_bytes - old_size + resized_size;
            return Ok(resized);
        }

        if layout.align() <= ALIGN_SIZE {
            return Err(TlsfError::NoMemory);
        }

        let new_layout = Layout::from_size_align(new_size, layout.align())
            .map_err(|_| TlsfError::InvalidAlign(layout.align()))?;
        let moved = self.alloc(new_layout)?;

        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), moved.as_ptr(), layout.size().min(new_size));
            self.dealloc(ptr, layout);
        }

        Ok(moved)
    }

    /// Bytes across all regions given to the heap that blocks can cover.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn available_bytes(&self) -> usize {
        self.total_bytes - self.used_bytes
    }

    /// The allocator behind the heap, for inspection.
    pub fn allocator(&self) -> Option<&Tlsf<'static>> {
        self.tlsf.as_ref()
    }
}

/// A [`Heap`] behind a mutex, usable as a [`GlobalAlloc`].
///
/// The allocator itself never locks; this is the external serialization
/// that makes sharing it between threads sound.
///
/// ```
/// use std::alloc::{GlobalAlloc, Layout};
/// use tlsf_alloc::{LockedHeap, MappedRegion};
///
/// static HEAP: LockedHeap = LockedHeap::empty();
///
/// let region = MappedRegion::new(1 << 20).unwrap();
/// unsafe { HEAP.init(region.as_ptr(), region.len()).unwrap() };
/// region.leak();
///
/// let layout = Layout::new::<[u64; 4]>();
/// let ptr = unsafe { HEAP.alloc(layout) };
/// assert!(!ptr.is_null());
/// unsafe { HEAP.dealloc(ptr, layout) };
/// ```
pub struct LockedHeap(Mutex<Heap>);

impl LockedHeap {
    pub const fn empty() -> Self {
        Self(parking_lot::const_mutex(Heap::empty()))
    }

    /// See [`Heap::init`].
    ///
    /// **SAFETY**: same contract as [`Heap::init`].
    pub unsafe fn init(&self, start: NonNull<u8>, size: usize) -> Result<(), TlsfError> {
        unsafe { self.0.lock().init(start, size) }
    }

    pub fn lock(&self) -> MutexGuard<'_, Heap> {
        self.0.lock()
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.0
            .lock()
            .alloc(layout)
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.0.lock().dealloc(ptr, layout) }
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let Some(ptr) = NonNull::new(ptr) else {
            return ptr::null_mut();
        };

        unsafe { self.0.lock().realloc(ptr, layout, new_size) }
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }
}

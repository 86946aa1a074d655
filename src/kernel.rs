//! Page granular memory straight from the operating system.
//!
//! The allocator itself never calls into the system: pools are always
//! handed to it. This module is where callers (the demos, the tests and
//! anyone who does not have a static buffer at hand) get such regions from.

use std::{
    ptr::NonNull,
    slice,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::debug;

use crate::{error::TlsfError, utils::align_up};

/// Virtual memory page size of the computer. This is usually 4096.
/// It can't be a constant since we don't know the value at compile time,
/// so it is computed on first use. 0 means "not computed yet".
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Platform handle the [`PlatformMemory`] implementations hang off.
pub(crate) struct Kernel;

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The allocator's top level view of this has nothing to do
/// with the concrete APIs offered by each kernel.
trait PlatformMemory {
    /// Request a memory region of size `len`. It returns a pointer to the
    /// given location or None if the underlying syscall fails.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the memory of size `len` starting from `addr` back to the kernel.
    unsafe fn return_memory(addr: *mut u8, len: usize);

    /// Returns the virtual memory page size of the computer in bytes.
    unsafe fn page_size() -> usize;
}

/// Wrapper to calculate the computer's page size.
#[inline]
pub fn page_size() -> usize {
    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let size = unsafe { Kernel::page_size() };
            PAGE_SIZE.store(size, Ordering::Relaxed);
            size
        }
        size => size,
    }
}

/// Wrapper to use [`Kernel::request_memory`]
#[inline]
unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
    unsafe { Kernel::request_memory(len) }
}

/// Wrapper to use [`Kernel::return_memory`]
#[inline]
unsafe fn return_memory(addr: *mut u8, len: usize) {
    unsafe { Kernel::return_memory(addr, len) }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};
    use log::warn;

    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                match mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) {
                    libc::MAP_FAILED => None,
                    addr => NonNull::new(addr.cast::<u8>()),
                }
            }
        }

        unsafe fn return_memory(addr: *mut u8, len: usize) {
            if unsafe { munmap(addr as *mut c_void, len as size_t) } != 0 {
                warn!(
                    "munmap failed for {len} bytes at {addr:p}: {}",
                    std::io::Error::last_os_error()
                );
            }
        }

        unsafe fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use crate::kernel::{Kernel, PlatformMemory};

    use log::warn;
    use windows::Win32::System::{Memory, SystemInformation};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: *mut u8, _len: usize) {
            let released =
                unsafe { Memory::VirtualFree(addr as *mut c_void, 0, Memory::MEM_RELEASE) };
            if let Err(err) = released {
                warn!("VirtualFree failed for region at {addr:p}: {err}");
            }
        }

        unsafe fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}

/// An anonymous, page aligned mapping owned by the caller.
///
/// The region is zeroed by the kernel and unmapped on drop, unless it is
/// [leaked](MappedRegion::leak) to back an allocator that lives for the
/// rest of the program.
///
/// ```text
/// +------------------------ len (multiple of the page size) -----------+
/// |  control structure and/or pools, as the caller sees fit            |
/// +--------------------------------------------------------------------+
/// ^ page aligned
/// ```
#[derive(Debug)]
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is exclusively owned.
unsafe impl Send for MappedRegion {}

impl MappedRegion {
    /// Maps at least `len` bytes, rounded up to the page size.
    pub fn new(len: usize) -> Result<Self, TlsfError> {
        if len == 0 {
            return Err(TlsfError::RegionTooSmall { bytes: 0, needed: 1 });
        }

        let len = align_up(len, page_size());
        let ptr = unsafe { request_memory(len) }.ok_or(TlsfError::NoMemory)?;

        debug!("mapped {len} bytes at {:#x}", ptr.as_ptr() as usize);

        Ok(Self { ptr, len })
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Mappings are never empty, this is here for symmetry with [`len`](Self::len).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Gives up ownership of the mapping, which then lives until the process
    /// exits.
    pub fn leak(self) -> &'static mut [u8] {
        let region = std::mem::ManuallyDrop::new(self);
        unsafe { slice::from_raw_parts_mut(region.ptr.as_ptr(), region.len) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        debug!("unmapping {} bytes at {:#x}", self.len, self.ptr.as_ptr() as usize);
        unsafe { return_memory(self.ptr.as_ptr(), self.len) }
    }
}

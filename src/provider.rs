//! Abstraction over environment-level memory reservation.
//!
//! The pool has nothing to do with the concrete APIs each platform offers
//! for grabbing raw pages, so all of that lives behind [`PageProvider`].
//! Every backend hands out zero-initialized, writable regions and takes
//! them back by exact address and byte count. Swapping one backend for
//! another must be invisible to the slabs built on top of it.
//!
//! This module is the only place in the crate where `cfg(unix)` /
//! `cfg(windows)` appear.

use std::ptr::NonNull;

/// Contract for reserving and releasing raw memory regions.
///
/// Implementations must return regions that are writable, zero-initialized
/// and aligned at least to the native word size.
pub trait PageProvider {
    /// Reserves a region of `len` bytes, or `None` if the environment
    /// cannot supply one.
    fn reserve(&self, len: usize) -> Option<NonNull<u8>>;

    /// Returns a region previously obtained from [`reserve`](Self::reserve).
    ///
    /// **SAFETY**: `region` must come from a `reserve` call on this same
    /// provider, `len` must be exactly the value passed to that call, and
    /// the region must not be used afterwards. The byte count is a strict
    /// precondition: [`MmapPages`] unmaps exactly `len` bytes.
    unsafe fn release(&self, region: NonNull<u8>, len: usize);
}

/// Backend over anonymous private memory mappings (`mmap`/`munmap`).
///
/// The kernel hands anonymous mappings out pre-zeroed, so the contract's
/// zero-initialization comes for free.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapPages;

#[cfg(unix)]
impl PageProvider for MmapPages {
    fn reserve(&self, len: usize) -> Option<NonNull<u8>> {
        use std::os::raw::{c_int, c_void};

        // mmap parameters.
        const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
        // Read-Write only memory.
        const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
        const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
        const FD: c_int = -1;
        const OFFSET: libc::off_t = 0;

        unsafe {
            let addr = libc::mmap(ADDR, len as libc::size_t, PROT, FLAGS, FD, OFFSET);

            if addr == libc::MAP_FAILED {
                None
            } else {
                Some(NonNull::new_unchecked(addr).cast::<u8>())
            }
        }
    }

    unsafe fn release(&self, region: NonNull<u8>, len: usize) {
        use std::os::raw::c_void;

        unsafe {
            libc::munmap(region.as_ptr() as *mut c_void, len as libc::size_t);
        }
    }
}

/// Backend over `VirtualAlloc`/`VirtualFree`.
///
/// Committed pages are zero-filled by the OS. `VirtualFree` with
/// `MEM_RELEASE` wants a zero size and frees the whole reservation, so the
/// byte count is unused on this backend.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualAllocPages;

#[cfg(windows)]
impl PageProvider for VirtualAllocPages {
    fn reserve(&self, len: usize) -> Option<NonNull<u8>> {
        use windows::Win32::System::Memory;

        let protection = Memory::PAGE_READWRITE;
        let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

        unsafe {
            let addr = Memory::VirtualAlloc(None, len, flags, protection);

            NonNull::new(addr.cast())
        }
    }

    unsafe fn release(&self, region: NonNull<u8>, _len: usize) {
        use std::os::raw::c_void;
        use windows::Win32::System::Memory;

        unsafe {
            let _ = Memory::VirtualFree(
                region.as_ptr() as *mut c_void,
                0,
                Memory::MEM_RELEASE,
            );
        }
    }
}

/// Portable backend over the process heap (`std::alloc`).
///
/// Available on every target; useful where virtual memory syscalls are off
/// limits or when a pool should draw from the same heap as everything else.
/// `alloc_zeroed` upholds the zero-initialization contract, and the layout
/// is rebuilt from the byte count on release, which is why that count has
/// to match exactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapPages;

impl PageProvider for HeapPages {
    fn reserve(&self, len: usize) -> Option<NonNull<u8>> {
        let layout = Self::layout(len)?;

        unsafe { NonNull::new(std::alloc::alloc_zeroed(layout)) }
    }

    unsafe fn release(&self, region: NonNull<u8>, len: usize) {
        // Reserve succeeded with this same len, so the layout is valid.
        let layout = Self::layout(len).unwrap();

        unsafe {
            std::alloc::dealloc(region.as_ptr(), layout);
        }
    }
}

impl HeapPages {
    fn layout(len: usize) -> Option<std::alloc::Layout> {
        std::alloc::Layout::from_size_align(len, std::mem::align_of::<usize>()).ok()
    }
}

/// The default backend for the current platform: [`MmapPages`] on unix,
/// [`VirtualAllocPages`] on windows, [`HeapPages`] everywhere else.
#[cfg(unix)]
pub type SystemPages = MmapPages;

#[cfg(windows)]
pub type SystemPages = VirtualAllocPages;

#[cfg(not(any(unix, windows)))]
pub type SystemPages = HeapPages;

#[cfg(test)]
mod tests {
    use super::*;

    // Both backends must behave identically from the slab's perspective,
    // so they share the same checks.
    fn reserve_is_zeroed_and_writable<P: PageProvider>(provider: P) {
        const LEN: usize = 1024;

        let region = provider.reserve(LEN).unwrap();

        unsafe {
            let bytes = std::slice::from_raw_parts_mut(region.as_ptr(), LEN);
            assert!(bytes.iter().all(|&b| b == 0));

            bytes[0] = 0xAB;
            bytes[LEN - 1] = 0xCD;
            assert_eq!(0xAB, bytes[0]);
            assert_eq!(0xCD, bytes[LEN - 1]);

            provider.release(region, LEN);
        }
    }

    #[test]
    fn heap_pages_contract() {
        reserve_is_zeroed_and_writable(HeapPages);
    }

    #[test]
    fn system_pages_contract() {
        reserve_is_zeroed_and_writable(SystemPages::default());
    }

    #[test]
    fn heap_pages_rejects_absurd_len() {
        assert!(HeapPages.reserve(usize::MAX).is_none());
    }
}

//! # Physical Memory Access
//!
//! The memory core keeps its bookkeeping (frame bitmaps, page directories
//! and tables before paging is on) in physical frames. Code can only
//! dereference addresses in the current address space, so a [`PhysMapper`]
//! decides how a physical address becomes a pointer.
//!
//! The kernel identity-maps the first 4 MiB of physical memory, which is
//! where all pool bookkeeping lives, so [`IdentityPhysMapper`] simply uses the
//! physical address as the pointer. Host tests substitute a mapper over a
//! simulated RAM buffer.

use kernel_memory_addresses::PhysicalAddress;

/// Converts physical addresses into references.
pub trait PhysMapper {
    /// Returns a mutable reference to a `T` stored at physical address `pa`.
    ///
    /// # Safety
    /// - `pa` must be mapped, suitably aligned for `T` and valid for
    ///   `size_of::<T>()` bytes.
    /// - The caller picks the lifetime and must not create aliasing references.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// Returns `len` bytes of physical memory starting at `pa`.
    ///
    /// The slice must be derived from a pointer valid for the whole range,
    /// not from a reference to its first byte.
    ///
    /// # Safety
    /// Same requirements as [`PhysMapper::phys_to_mut`] for the whole range.
    unsafe fn phys_to_slice<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8];
}

/// [`PhysMapper`] for memory that is identity-mapped (or for code running
/// before paging is enabled).
#[derive(Copy, Clone, Debug, Default)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let ptr = pa.as_usize() as *mut T;
        // SAFETY: Caller guarantees the address is identity-mapped and valid.
        unsafe { &mut *ptr }
    }

    unsafe fn phys_to_slice<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        let ptr = pa.as_usize() as *mut u8;
        // SAFETY: Caller guarantees the range is identity-mapped and valid.
        unsafe { core::slice::from_raw_parts_mut(ptr, len) }
    }
}

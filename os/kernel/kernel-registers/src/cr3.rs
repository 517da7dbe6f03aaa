use bitfield_struct::bitfield;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};

/// CR3 for 32-bit non-PAE paging.
///
/// Holds the frame of the active page directory and the cache-control bits
/// used when the CPU walks it. Storing CR3, even with an unchanged value,
/// also flushes all non-global translations.
///
/// ### Examples
/// ```rust
/// # use kernel_registers::cr3::Cr3;
/// # use kernel_memory_addresses::FrameNumber;
/// let cr3 = Cr3::from_directory(FrameNumber::new(512));
/// assert_eq!(cr3.into_bits(), 0x0020_0000);
/// assert_eq!(cr3.directory(), FrameNumber::new(512));
/// ```
#[bitfield(u32)]
pub struct Cr3 {
    #[bits(3)]
    reserved0: u8,

    /// Bit 3: page-level write-through for directory accesses.
    pub pwt: bool,

    /// Bit 4: page-level cache disable for directory accesses.
    pub pcd: bool,

    #[bits(7)]
    reserved1: u8,

    /// Bits 12..31: page directory frame number.
    #[bits(20)]
    directory_frame: u32,
}

impl Cr3 {
    /// CR3 value pointing at the directory stored in `frame`, default caching.
    #[inline]
    #[must_use]
    pub const fn from_directory(frame: FrameNumber) -> Self {
        Self::new().with_directory_frame(frame.as_u32())
    }

    /// Frame holding the active page directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> FrameNumber {
        FrameNumber::new(self.directory_frame())
    }

    /// Physical address of the active page directory.
    #[inline]
    #[must_use]
    pub const fn directory_address(&self) -> PhysicalAddress {
        self.directory().base()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_do_not_leak_into_directory() {
        let cr3 = Cr3::from_directory(FrameNumber::new(0x12345))
            .with_pwt(true)
            .with_pcd(true);
        assert_eq!(cr3.into_bits(), 0x1234_5018);
        assert_eq!(cr3.directory_address(), PhysicalAddress::new(0x1234_5000));
    }
}

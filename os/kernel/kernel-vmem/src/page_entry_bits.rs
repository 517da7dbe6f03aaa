use bitfield_struct::bitfield;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};

/// A 32-bit non-PAE paging entry.
///
/// Directory entries (PDEs) and table entries (PTEs) share one layout: flag
/// bits in the low 12 bits and the frame number of the next table (PDE) or
/// the mapped page (PTE) in the upper 20 bits.
///
/// ### Bit layout
///
/// | Bits  | Name | Meaning |
/// |-------|------|---------|
/// | 0     | `P`  | Present |
/// | 1     | `RW` | Writable |
/// | 2     | `US` | User accessible |
/// | 3     | `PWT`| Write-through |
/// | 4     | `PCD`| Cache disable |
/// | 5     | `A`  | Accessed |
/// | 6     | `D`  | Dirty (PTE only) |
/// | 7     | `PS` | 4 MiB page (PDE only, unused here) |
/// | 8     | `G`  | Global (PTE only) |
/// | 9–11  | avail| Ignored by hardware |
/// | 12–31 | frame| Frame number |
///
/// ### Example
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// # use kernel_memory_addresses::FrameNumber;
/// let e = PageEntryBits::mapping(FrameNumber::new(0x123));
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// assert_eq!(PageEntryBits::placeholder().into_bits(), 2);
/// ```
#[bitfield(u32)]
pub struct PageEntryBits {
    /// Present (P, bit 0). Clear means any access through this entry faults.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on the first write through a PTE.
    pub dirty: bool,

    /// Page Size (PS, bit 7). Always clear; only 4 KiB pages are used.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global_translation: bool,

    #[bits(3)]
    pub os_available: u8,

    #[bits(20)]
    frame_bits: u32,
}

impl PageEntryBits {
    /// Not present but writable: the pattern every unbacked slot holds.
    #[inline]
    #[must_use]
    pub const fn placeholder() -> Self {
        Self::new().with_writable(true)
    }

    /// Present and writable entry referencing `frame`.
    ///
    /// Used for both directory entries (pointing at a page table) and
    /// table entries (mapping a data page).
    #[inline]
    #[must_use]
    pub const fn mapping(frame: FrameNumber) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_frame_bits(frame.as_u32())
    }

    #[inline]
    #[must_use]
    pub const fn frame(&self) -> FrameNumber {
        FrameNumber::new(self.frame_bits())
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        self.frame().base()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_present_and_writable() {
        let e = PageEntryBits::mapping(FrameNumber::new(1024));
        assert!(e.present());
        assert!(e.writable());
        assert!(!e.user_access());
        assert_eq!(e.physical_address(), PhysicalAddress::new(0x0040_0000));
    }

    #[test]
    fn clearing_present_keeps_frame() {
        let mut e = PageEntryBits::mapping(FrameNumber::new(7));
        e.set_present(false);
        assert_eq!(e.into_bits(), 0x7002);
        assert_eq!(e.frame(), FrameNumber::new(7));
    }
}

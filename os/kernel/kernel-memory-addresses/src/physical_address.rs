use crate::{FrameNumber, PAGE_OFFSET_MASK};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// A 32-bit byte address on the physical bus. Distinct from
/// [`VirtualAddress`](super::VirtualAddress) so that translated and
/// untranslated addresses cannot be mixed up.
///
/// ### Semantics
/// - [`PhysicalAddress::frame`] yields the 4 KiB frame containing the address.
/// - [`PhysicalAddress::offset`] yields the byte offset inside that frame.
/// - Page-table entries store only the frame number; the offset is always
///   taken from the virtual address being translated.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0040_0042);
/// assert_eq!(pa.frame(), FrameNumber::new(0x400));
/// assert_eq!(pa.offset(), 0x42);
/// assert_eq!(pa.frame().base() + pa.offset(), pa);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Widens the address for pointer arithmetic on the host.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn frame(self) -> FrameNumber {
        FrameNumber::containing(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0 & PAGE_OFFSET_MASK
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:08X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for PhysicalAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<FrameNumber> for PhysicalAddress {
    #[inline]
    fn from(value: FrameNumber) -> Self {
        value.base()
    }
}

impl Add<u32> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

use crate::{PAGE_OFFSET_MASK, PageNumber, PhysicalAddress};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual (linear) memory address.
///
/// Every load and store the CPU performs once paging is enabled goes through
/// the two-level translation; a `VirtualAddress` is the value fed into it.
///
/// ### Semantics
/// - Bits `31..22` index the page directory, bits `21..12` index the page
///   table and bits `11..0` are the in-page offset.
/// - [`VirtualAddress::identity`] reinterprets a physical address as a linear
///   one. This is only meaningful inside the identity-mapped shared region or
///   before paging is enabled.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x4000_1008);
/// assert_eq!(va.page(), PageNumber::new(0x40001));
/// assert_eq!(va.offset(), 8);
/// assert_eq!(va.checked_add(u32::MAX), None);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn identity(pa: PhysicalAddress) -> Self {
        Self(pa.as_u32())
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> PageNumber {
        PageNumber::containing(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0 & PAGE_OFFSET_MASK
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.offset() == 0
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u32) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<PageNumber> for VirtualAddress {
    #[inline]
    fn from(value: PageNumber) -> Self {
        value.base()
    }
}

impl Add<u32> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

use crate::{PAGE_SHIFT, VirtualAddress};
use core::fmt;
use core::ops::{Add, Sub};

/// Index of a 4 KiB virtual page.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageNumber(u32);

impl PageNumber {
    #[inline]
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn containing(va: VirtualAddress) -> Self {
        Self(va.as_u32() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.0 << PAGE_SHIFT)
    }
}

impl fmt::Debug for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page(#{})", self.0)
    }
}

impl Add<u32> for PageNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub for PageNumber {
    type Output = u32;
    #[inline]
    fn sub(self, rhs: Self) -> u32 {
        self.0 - rhs.0
    }
}

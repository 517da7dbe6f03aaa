//! # Two-Level Page Table Indices
//!
//! A 32-bit linear address splits into a directory index, a table index and
//! an in-page offset:
//!
//! ```text
//! | 31 ──── 22 | 21 ──── 12 | 11 ──── 0 |
//! |  directory |   table    |  offset   |
//! ```
//!
//! Both levels hold [`ENTRIES_PER_TABLE`] 4-byte entries, so each table fills
//! exactly one frame.

use kernel_memory_addresses::{PageNumber, VirtualAddress};

/// Entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: u32 = 1024;

/// Size of one entry in bytes.
pub const ENTRY_SIZE: u32 = 4;

/// Index into the page directory (VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirectoryIndex(u32);

/// Index into a page table (VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u32);

impl DirectoryIndex {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self(va.as_u32() >> 22)
    }

    #[inline]
    #[must_use]
    pub const fn of_page(page: PageNumber) -> Self {
        Self(page.as_u32() >> 10)
    }

    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        debug_assert!(v < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl TableIndex {
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self((va.as_u32() >> 12) & 0x3FF)
    }

    #[inline]
    #[must_use]
    pub const fn of_page(page: PageNumber) -> Self {
        Self(page.as_u32() & 0x3FF)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        debug_assert!(v < ENTRIES_PER_TABLE);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirectoryIndex, TableIndex) {
    (DirectoryIndex::from(va), TableIndex::from(va))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_ok() {
        let va = VirtualAddress::new(0x4012_3456);
        let (d, t) = split_indices(va);
        assert_eq!(d.as_u32(), 0x100);
        assert_eq!(t.as_u32(), 0x123);
    }

    #[test]
    fn page_and_address_agree() {
        let va = VirtualAddress::new(0xFFFF_F00C);
        assert_eq!(DirectoryIndex::of_page(va.page()), DirectoryIndex::from(va));
        assert_eq!(TableIndex::of_page(va.page()), TableIndex::from(va));
    }
}

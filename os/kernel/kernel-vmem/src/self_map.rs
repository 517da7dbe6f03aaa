//! # Self-Map Addressing
//!
//! The last directory slot ([`SELF_MAP_INDEX`]) points at the directory's own
//! frame. The CPU then treats the directory as a page table for the top 4 MiB
//! of the address space, which makes every page table visible at
//! `0xFFC0_0000 + dir * 4096` and the directory itself at `0xFFFF_F000`.
//!
//! The entry for any `(dir, table)` pair therefore lives at a fixed linear
//! address, and the memory core never needs physical pointers to its own
//! tables once paging is on.
//!
//! ```rust
//! # use kernel_vmem::self_map::*;
//! # use kernel_vmem::page_table::{DirectoryIndex, TableIndex};
//! let pte = table_entry_address(DirectoryIndex::new(0x80), TableIndex::new(1));
//! assert_eq!(pte.as_u32(), 0xFFC8_0004);
//! let pde = directory_entry_address(DirectoryIndex::new(0x80));
//! assert_eq!(pde.as_u32(), 0xFFFF_F200);
//! ```

use crate::page_table::{DirectoryIndex, ENTRY_SIZE, TableIndex};
use kernel_memory_addresses::{PAGE_SHIFT, VirtualAddress};

/// Directory slot that maps the directory onto itself.
pub const SELF_MAP_INDEX: DirectoryIndex = DirectoryIndex::new(0x3FF);

/// Start of the window through which all page tables are visible.
pub const SELF_MAP_BASE: VirtualAddress = VirtualAddress::new(SELF_MAP_INDEX.as_u32() << 22);

/// Linear address of the page directory itself.
pub const DIRECTORY_BASE: VirtualAddress = table_base(SELF_MAP_INDEX);

/// Linear address of the page table covering directory slot `dir`.
#[inline]
#[must_use]
pub const fn table_base(dir: DirectoryIndex) -> VirtualAddress {
    VirtualAddress::new(SELF_MAP_BASE.as_u32() | (dir.as_u32() << PAGE_SHIFT))
}

/// Linear address of entry `table` in the page table of directory slot `dir`.
#[inline]
#[must_use]
pub const fn table_entry_address(dir: DirectoryIndex, table: TableIndex) -> VirtualAddress {
    VirtualAddress::new(table_base(dir).as_u32() | (table.as_u32() * ENTRY_SIZE))
}

/// Linear address of directory slot `dir`.
#[inline]
#[must_use]
pub const fn directory_entry_address(dir: DirectoryIndex) -> VirtualAddress {
    table_entry_address(SELF_MAP_INDEX, TableIndex::new(dir.as_u32()))
}

/// Whether `va` lies in the self-map window.
#[inline]
#[must_use]
pub const fn is_self_mapped(va: VirtualAddress) -> bool {
    DirectoryIndex::from(va).as_u32() == SELF_MAP_INDEX.as_u32()
}

//! # Virtual Memory Support
//!
//! Demand-paged virtual memory for an i686 kernel: 32-bit two-level paging
//! with 4 KiB pages, a self-mapped page directory and virtual memory pools
//! that reserve address space and let the page-fault handler back it.
//!
//! ## i686 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31 ──── 22 | 21 ──── 12 | 11 ──── 0 |
//! |  directory |   table    |  offset   |
//! ```
//!
//! ```text
//!  CR3 → Page Directory ──► PDE ──► Page Table ──► PTE ──► 4 KiB frame
//! ```
//!
//! Directory and table both hold 1024 entries of 4 bytes; each fits one
//! frame. See [`PageEntryBits`] for the entry encoding.
//!
//! ## What you get
//!
//! - [`PageTableManager`]: one address space. Identity-maps the first 4 MiB,
//!   keeps its directory self-mapped at slot 1023 ([`self_map`]) and resolves
//!   page faults inside its registered pools.
//! - [`VmPool`]: page-granular reservations inside one virtual window.
//! - [`Paging`]: process-wide state (frame pools, active directory, paging
//!   enable flag) shared by all address spaces.
//! - [`Mmu`]: the hardware seam for control registers and linear memory.
//! - [`MemorySystem`]: the boot sequence tying frame pools and paging
//!   together, and [`KernelMemory`] to keep it reachable from the fault trap.
//!
//! ## Lifecycle
//!
//! ```text
//! Paging::configure ─► PageTableManager::new ─► activate ─► Paging::enable
//!                                                  │
//!      create_region / PageTableManager::allocate ◄┘
//!                          │ first touch faults
//!                          ▼
//!                  handle_fault ─► frame from process pool
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
pub mod bootstrap;
pub mod fault;
pub mod kernel_memory;
pub mod mmu;
mod page_entry_bits;
pub mod page_table;
pub mod paging;
pub mod self_map;
pub mod vm_pool;

pub use crate::address_space::{PageTableManager, RegionId};
pub use crate::bootstrap::{BootError, MemoryLayout, MemorySystem};
pub use crate::fault::{FaultError, PageFaultError, Registers};
pub use crate::kernel_memory::KernelMemory;
pub use crate::mmu::Mmu;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::paging::{Paging, PagingError};
pub use crate::vm_pool::{Region, VmPool, VmPoolError};

#[cfg(target_arch = "x86")]
pub use crate::kernel_memory::{KERNEL_MEMORY, page_fault_entry};
#[cfg(target_arch = "x86")]
pub use crate::mmu::X86Mmu;

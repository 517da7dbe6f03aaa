//! # Kernel Memory Configuration
//!
//! Compile-time description of the physical and virtual memory layout the
//! memory core is brought up with. Every other kernel crate reads its layout
//! from here so that the frame pools, the identity-mapped shared region and
//! the virtual memory pools agree on where things live.
//!
//! ## Physical Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   Low memory, kernel image      │  not managed
//! 2 MiB       ├─────────────────────────────────┤  frame 512
//!             │   Kernel frame pool             │
//! 4 MiB       ├─────────────────────────────────┤  frame 1024
//!             │   Process frame pool            │
//! 15 MiB      ├ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┤  frame 3840
//!             │   Memory hole (off limits)      │
//! 16 MiB      ├ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ┤  frame 4096
//!             │   Process frame pool (cont.)    │
//! 32 MiB      └─────────────────────────────────┘  frame 8192
//! ```
//!
//! ## Virtual Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │   Shared region (identity)      │  4 MiB, one page table
//! 0x0040_0000 ├─────────────────────────────────┤
//!             │   (unmapped)                    │
//! 0x2000_0000 ├─────────────────────────────────┤  512 MiB
//!             │   Code pool                     │  256 MiB
//! 0x3000_0000 ├─────────────────────────────────┤
//!             │   (unmapped)                    │
//! 0x4000_0000 ├─────────────────────────────────┤  1 GiB
//!             │   Heap pool                     │  256 MiB
//! 0x5000_0000 ├─────────────────────────────────┤
//!             │   (unmapped)                    │
//! 0xFFC0_0000 ├─────────────────────────────────┤  directory slot 1023
//!             │   Self-map window               │  page tables + directory
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;

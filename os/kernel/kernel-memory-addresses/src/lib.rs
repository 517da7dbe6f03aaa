//! # Physical and Virtual Memory Address Types (i686)
//!
//! Strongly typed wrappers for the raw 32-bit values that flow through the
//! memory core: byte addresses, physical frame numbers and virtual page
//! numbers.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address on the physical bus (RAM / MMIO). |
//! | [`VirtualAddress`]  | A linear address as seen by the CPU after translation. |
//! | [`FrameNumber`]     | Index of a 4 KiB physical frame (`address >> 12`). |
//! | [`PageNumber`]      | Index of a 4 KiB virtual page (`address >> 12`). |
//!
//! Frames and pages are never materialised as objects; they are only numbers.
//! Keeping four distinct types makes it a compile error to hand a page number
//! to a frame allocator or to store a virtual address in a page-table entry.
//!
//! ## Page Size
//!
//! Non-PAE 32-bit paging uses a single page size of [`PAGE_SIZE`] bytes
//! (4 KiB). All frame/page arithmetic is relative to it.
//!
//! ```text
//! | 31 ─────────────── 12 | 11 ──── 0 |
//! |   frame / page number |  offset   |
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x2000_1234);
//! let page = va.page();
//! assert_eq!(page.as_u32(), 0x2_0001);
//! assert_eq!(va.offset(), 0x234);
//! assert_eq!(page.base().as_u32() + va.offset(), va.as_u32());
//!
//! let frame = FrameNumber::new(512);
//! assert_eq!(frame.base(), PhysicalAddress::new(2 * 1024 * 1024));
//! assert_eq!(FrameNumber::containing(frame.base() + 42), frame);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod frame_number;
mod page_number;
mod physical_address;
mod virtual_address;

pub use crate::frame_number::FrameNumber;
pub use crate::page_number::PageNumber;
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Size of a frame / page in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// `log2(PAGE_SIZE)`: the number of low address bits used for the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the in-page offset bits.
pub const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

/// Whether `bytes` is a whole number of pages.
#[inline]
#[must_use]
pub const fn is_page_multiple(bytes: u32) -> bool {
    bytes & PAGE_OFFSET_MASK == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_address_round_trip() {
        let pa = PhysicalAddress::new(0x00F0_0ABC);
        let frame = pa.frame();
        assert_eq!(frame.as_u32(), 0xF00);
        assert_eq!(frame.base().as_u32(), 0x00F0_0000);
        assert_eq!(pa.offset(), 0xABC);
    }

    #[test]
    fn page_and_address_round_trip() {
        let va = VirtualAddress::new(0xFFC0_3004);
        let page = va.page();
        assert_eq!(page.as_u32(), 0xFFC03);
        assert_eq!(page.base().as_u32(), 0xFFC0_3000);
        assert_eq!(va.offset(), 4);
    }

    #[test]
    fn page_multiples() {
        assert!(is_page_multiple(0));
        assert!(is_page_multiple(PAGE_SIZE * 7));
        assert!(!is_page_multiple(PAGE_SIZE + 1));
    }

    #[test]
    fn identity_conversion_keeps_bits() {
        let pa = PhysicalAddress::new(0x0020_0000);
        assert_eq!(VirtualAddress::identity(pa).as_u32(), 0x0020_0000);
    }

    #[test]
    fn display_is_hex() {
        extern crate std;
        use std::format;
        assert_eq!(format!("{}", VirtualAddress::new(0x1000)), "0x00001000");
        assert_eq!(format!("{:?}", PhysicalAddress::new(0x1000)), "PA(0x00001000)");
        assert_eq!(format!("{}", FrameNumber::new(3)), "#3");
    }
}

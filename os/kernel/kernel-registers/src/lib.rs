//! # Typed i686 Control Registers
//!
//! The three control registers the 32-bit (non-PAE) paging core touches:
//!
//! * [`Cr0`](cr0::Cr0): bit 31 turns paging on.
//! * [`Cr2`](cr2::Cr2): linear address of the last page fault.
//! * [`Cr3`](cr3::Cr3): physical base of the active page directory.
//!
//! The bit layouts are plain data and usable on any host. The `mov`
//! instructions that move them in and out of the CPU are only compiled for
//! `target_arch = "x86"` with the `asm` feature enabled.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr2")]
pub mod cr2;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register access is privileged and requires Ring 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing a control register changes how every following memory access
    /// is translated.
    unsafe fn store_unsafe(self);
}

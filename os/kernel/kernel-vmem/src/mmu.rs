//! # Hardware Seam
//!
//! The memory core never touches control registers or raw pointers itself.
//! It goes through an [`Mmu`], which on i686 is [`X86Mmu`] and in host tests
//! is a software page walker over simulated RAM.

use kernel_memory_addresses::VirtualAddress;
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;

/// Control registers and linear memory as seen by the executing CPU.
pub trait Mmu {
    fn cr0(&self) -> Cr0;

    /// # Safety
    /// Toggling paging changes how every subsequent access is translated.
    unsafe fn set_cr0(&mut self, cr0: Cr0);

    /// Address of the most recent page fault.
    fn cr2(&self) -> Cr2;

    fn cr3(&self) -> Cr3;

    /// # Safety
    /// The referenced directory must map all code and data in use.
    unsafe fn set_cr3(&mut self, cr3: Cr3);

    /// Reads the 32-bit word at linear address `at`.
    ///
    /// # Safety
    /// `at` must be 4-byte aligned and currently mapped (or addressable
    /// physically while paging is off).
    unsafe fn read_word(&self, at: VirtualAddress) -> u32;

    /// Writes the 32-bit word at linear address `at`.
    ///
    /// # Safety
    /// As for [`Mmu::read_word`]; additionally nothing else may rely on the
    /// previous value.
    unsafe fn write_word(&mut self, at: VirtualAddress, value: u32);

    /// Drops all cached translations.
    ///
    /// # Safety
    /// CR3 must reference a valid directory.
    unsafe fn flush_tlb(&mut self) {
        let cr3 = self.cr3();
        // SAFETY: Reloading the current value keeps translation unchanged.
        unsafe { self.set_cr3(cr3) }
    }
}

/// [`Mmu`] backed by the real i686 CPU.
#[cfg(target_arch = "x86")]
#[derive(Copy, Clone, Debug, Default)]
pub struct X86Mmu;

#[cfg(target_arch = "x86")]
impl Mmu for X86Mmu {
    fn cr0(&self) -> Cr0 {
        use kernel_registers::LoadRegisterUnsafe;
        // SAFETY: The memory core runs at CPL 0.
        unsafe { Cr0::load_unsafe() }
    }

    unsafe fn set_cr0(&mut self, cr0: Cr0) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { cr0.store_unsafe() }
    }

    fn cr2(&self) -> Cr2 {
        use kernel_registers::LoadRegisterUnsafe;
        // SAFETY: The memory core runs at CPL 0.
        unsafe { Cr2::load_unsafe() }
    }

    fn cr3(&self) -> Cr3 {
        use kernel_registers::LoadRegisterUnsafe;
        // SAFETY: The memory core runs at CPL 0.
        unsafe { Cr3::load_unsafe() }
    }

    unsafe fn set_cr3(&mut self, cr3: Cr3) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { cr3.store_unsafe() }
    }

    unsafe fn read_word(&self, at: VirtualAddress) -> u32 {
        let ptr = at.as_u32() as usize as *const u32;
        unsafe { core::ptr::read_volatile(ptr) }
    }

    unsafe fn write_word(&mut self, at: VirtualAddress, value: u32) {
        let ptr = at.as_u32() as usize as *mut u32;
        unsafe { core::ptr::write_volatile(ptr, value) }
    }
}

use kernel_memory_addresses::VirtualAddress;

/// CR2: the linear address whose access raised the most recent page fault.
///
/// Read-only from the memory core's perspective; the CPU writes it when
/// delivering exception 14.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Cr2(VirtualAddress);

impl Cr2 {
    #[inline]
    #[must_use]
    pub const fn new(address: VirtualAddress) -> Self {
        Self(address)
    }

    #[inline]
    #[must_use]
    pub const fn fault_address(self) -> VirtualAddress {
        self.0
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr2 {
    unsafe fn load_unsafe() -> Self {
        let cr2: u32;
        unsafe {
            core::arch::asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
        }
        Self(VirtualAddress::new(cr2))
    }
}

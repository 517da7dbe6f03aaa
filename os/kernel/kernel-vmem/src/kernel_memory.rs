//! # Kernel-Wide Memory Singleton
//!
//! Page faults arrive through a trap with no context pointer, so the kernel's
//! [`MemorySystem`] is installed once into a global and reached from there.
//! The spin lock makes bitmap updates, entry installation and the following
//! TLB flush one critical section.

use crate::bootstrap::MemorySystem;
use crate::fault::{FaultError, Registers};
use crate::mmu::Mmu;
use spin::{Mutex, Once};

pub struct KernelMemory<M: Mmu> {
    inner: Once<Mutex<MemorySystem<M>>>,
}

impl<M: Mmu> KernelMemory<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: Once::new() }
    }

    /// Installs `system`. Returns `false` (dropping `system`) if one is
    /// already installed.
    #[must_use]
    pub fn install(&self, system: MemorySystem<M>) -> bool {
        let mut installed = false;
        self.inner.call_once(|| {
            installed = true;
            Mutex::new(system)
        });
        installed
    }

    #[inline]
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.inner.is_completed()
    }

    /// Runs `f` with exclusive access to the installed system.
    #[must_use]
    pub fn with<R>(&self, f: impl FnOnce(&mut MemorySystem<M>) -> R) -> Option<R> {
        let system = self.inner.get()?;
        let mut guard = system.lock();
        Some(f(&mut guard))
    }

    /// Resolves the fault recorded in CR2.
    ///
    /// # Errors
    /// [`FaultError::NotActive`] before installation, otherwise see
    /// [`MemorySystem::handle_page_fault`].
    pub fn handle_page_fault(&self, registers: &Registers) -> Result<(), FaultError> {
        self.with(|system| system.handle_page_fault(registers))
            .unwrap_or(Err(FaultError::NotActive))
    }
}

impl<M: Mmu> Default for KernelMemory<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "x86")]
pub use self::x86::{KERNEL_MEMORY, page_fault_entry};

#[cfg(target_arch = "x86")]
mod x86 {
    use super::KernelMemory;
    use crate::fault::Registers;
    use crate::mmu::X86Mmu;
    use core::hint::spin_loop;
    use log::error;

    /// The memory system of the running kernel.
    pub static KERNEL_MEMORY: KernelMemory<X86Mmu> = KernelMemory::new();

    /// Page fault (exception 14) entry, called by the assembly stub with the
    /// saved register frame. Returns to retry the faulting instruction, or
    /// never returns if the fault cannot be resolved.
    #[unsafe(no_mangle)]
    pub extern "C" fn page_fault_entry(registers: &Registers) {
        if let Err(err) = KERNEL_MEMORY.handle_page_fault(registers) {
            error!("{err}");
            error!("{} (eip={:#010x})", registers.error().explain(), registers.eip);
            loop {
                spin_loop();
            }
        }
    }
}

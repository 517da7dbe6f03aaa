use bitfield_struct::bitfield;

/// CR0 in 32-bit protected mode.
///
/// Only [`Cr0::pg_paging`] matters to the memory core; the remaining bits are
/// modeled so a read-modify-write keeps them intact.
///
/// ### Examples
/// ```rust
/// # use kernel_registers::cr0::Cr0;
/// let cr0 = Cr0::from_bits(0x0000_0011).with_pg_paging(true);
/// assert_eq!(cr0.into_bits(), 0x8000_0011);
/// ```
#[bitfield(u32)]
pub struct Cr0 {
    /// Bit 0: protected mode enable.
    pub pe_protection_enable: bool,
    /// Bit 1: monitor coprocessor.
    pub mp_monitor_coprocessor: bool,
    /// Bit 2: x87 emulation.
    pub em_emulation: bool,
    /// Bit 3: task switched.
    pub ts_task_switched: bool,
    /// Bit 4: extension type.
    pub et_extension_type: bool,
    /// Bit 5: native x87 error reporting.
    pub ne_numeric_error: bool,
    #[bits(10)]
    reserved_6_15: u16,
    /// Bit 16: supervisor writes honour read-only pages.
    pub wp_write_protect: bool,
    reserved_17: bool,
    /// Bit 18: alignment checking.
    pub am_alignment_mask: bool,
    #[bits(10)]
    reserved_19_28: u16,
    /// Bit 29: not write-through.
    pub nw_not_write_through: bool,
    /// Bit 30: cache disable.
    pub cd_cache_disable: bool,
    /// Bit 31: paging enable. Requires bit 0 and a valid CR3.
    pub pg_paging: bool,
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let cr0: u32;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

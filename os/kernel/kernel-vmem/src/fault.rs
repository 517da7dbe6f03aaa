//! # Page Fault Types

use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// Register snapshot pushed by the exception stub, in push order.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct Registers {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

impl Registers {
    #[inline]
    #[must_use]
    pub const fn error(&self) -> PageFaultError {
        PageFaultError::from_bits(self.err_code)
    }
}

/// Page-fault error code (i686, exception 14).
#[bitfield(u32)]
pub struct PageFaultError {
    /// 0 = non-present page, 1 = protection violation.
    pub present: bool,

    /// 0 = read, 1 = write.
    pub write: bool,

    /// 0 = supervisor, 1 = user mode.
    pub user: bool,

    /// A reserved bit was set in a paging structure.
    pub reserved_bit: bool,

    /// Instruction fetch.
    pub instruction_fetch: bool,

    #[bits(27)]
    __: u32,
}

impl PageFaultError {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            if self.write() {
                "Write to non-present page"
            } else {
                "Read from non-present page"
            }
        } else if self.user() {
            "User-mode access to protected page"
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

/// Why a page fault could not be resolved.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum FaultError {
    #[error("Segmentation Fault: {address}")]
    ProtectionViolation { address: VirtualAddress },
    #[error("out of frames while handling fault at {address}")]
    OutOfFrames { address: VirtualAddress },
    #[error("fault delivered to an inactive address space")]
    NotActive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_layout_matches_stub() {
        assert_eq!(size_of::<Registers>(), 19 * 4);
        assert_eq!(core::mem::offset_of!(Registers, err_code), 13 * 4);
    }

    #[test]
    fn explain_error_codes() {
        assert_eq!(PageFaultError::from_bits(0b010).explain(), "Write to non-present page");
        assert_eq!(PageFaultError::from_bits(0b111).explain(), "User-mode access to protected page");
        assert_eq!(PageFaultError::from_bits(0b001).explain(), "Read access to protected page");
    }
}

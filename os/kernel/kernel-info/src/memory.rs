//! # Memory Layout

use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, VirtualAddress};

const MIB: u32 = 1024 * 1024;

/// First frame of the kernel frame pool (2 MiB).
pub const KERNEL_POOL_START_FRAME: FrameNumber = FrameNumber::new(2 * MIB / PAGE_SIZE);

/// Number of frames managed by the kernel pool (2 MiB worth).
pub const KERNEL_POOL_FRAMES: u32 = 2 * MIB / PAGE_SIZE;

/// First frame of the process frame pool (4 MiB).
pub const PROCESS_POOL_START_FRAME: FrameNumber = FrameNumber::new(4 * MIB / PAGE_SIZE);

/// Number of frames managed by the process pool (28 MiB worth).
pub const PROCESS_POOL_FRAMES: u32 = 28 * MIB / PAGE_SIZE;

/// First frame of the physical memory hole at 15 MiB.
///
/// The hole lies inside the process pool and is reserved as off limits at boot.
pub const MEM_HOLE_START_FRAME: FrameNumber = FrameNumber::new(15 * MIB / PAGE_SIZE);

/// Size of the memory hole in frames (1 MiB worth).
pub const MEM_HOLE_FRAMES: u32 = MIB / PAGE_SIZE;

/// Bytes at the bottom of the address space that every address space
/// identity-maps. One page table covers exactly this much.
pub const SHARED_SIZE: u32 = 4 * MIB;

/// Start of the code pool window (512 MiB).
pub const CODE_POOL_BASE: VirtualAddress = VirtualAddress::new(512 * MIB);

/// Size of the code pool window.
pub const CODE_POOL_SIZE: u32 = 256 * MIB;

/// Start of the heap pool window (1 GiB).
pub const HEAP_POOL_BASE: VirtualAddress = VirtualAddress::new(1024 * MIB);

/// Size of the heap pool window.
pub const HEAP_POOL_SIZE: u32 = 256 * MIB;

/// Total physical memory the kernel expects (32 MiB).
pub const PHYSICAL_MEMORY_BYTES: u32 = 32 * MIB;

const _: () = {
    assert!(KERNEL_POOL_START_FRAME.as_u32() + KERNEL_POOL_FRAMES == PROCESS_POOL_START_FRAME.as_u32());
    assert!(
        (PROCESS_POOL_START_FRAME.as_u32() + PROCESS_POOL_FRAMES) * PAGE_SIZE
            == PHYSICAL_MEMORY_BYTES
    );
    assert!(MEM_HOLE_START_FRAME.as_u32() >= PROCESS_POOL_START_FRAME.as_u32());
    assert!(
        MEM_HOLE_START_FRAME.as_u32() + MEM_HOLE_FRAMES
            <= PROCESS_POOL_START_FRAME.as_u32() + PROCESS_POOL_FRAMES
    );
    assert!(SHARED_SIZE == 1024 * PAGE_SIZE);
    assert!(CODE_POOL_BASE.as_u32() + CODE_POOL_SIZE <= HEAP_POOL_BASE.as_u32());
    assert!(CODE_POOL_BASE.is_page_aligned() && HEAP_POOL_BASE.is_page_aligned());
};

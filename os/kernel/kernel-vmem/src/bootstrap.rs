//! # Memory Subsystem Bring-Up
//!
//! [`MemorySystem::init`] runs the boot sequence of the memory core:
//!
//! 1. kernel frame pool, bitmap hosted in its own first frame;
//! 2. process frame pool, bitmap hosted in kernel-pool frames;
//! 3. the physical memory hole reserved off limits;
//! 4. paging configured, kernel address space built and loaded;
//! 5. paging enabled.

use crate::address_space::{PageTableManager, RegionId};
use crate::fault::{FaultError, Registers};
use crate::mmu::Mmu;
use crate::paging::{Paging, PagingError};
use crate::vm_pool::VmPoolError;
use kernel_alloc::frame_pool::bitmap_frames_needed;
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_alloc::registry::{FramePoolError, FramePools};
use kernel_info::memory;
use kernel_memory_addresses::{FrameNumber, PageNumber, VirtualAddress};
use log::info;

/// Where the memory core finds its frames.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryLayout {
    pub kernel_pool_start: FrameNumber,
    pub kernel_pool_frames: u32,
    pub process_pool_start: FrameNumber,
    pub process_pool_frames: u32,
    /// Frames inside the process pool that must never be used.
    pub memory_hole: Option<(FrameNumber, u32)>,
    pub shared_size: u32,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            kernel_pool_start: memory::KERNEL_POOL_START_FRAME,
            kernel_pool_frames: memory::KERNEL_POOL_FRAMES,
            process_pool_start: memory::PROCESS_POOL_START_FRAME,
            process_pool_frames: memory::PROCESS_POOL_FRAMES,
            memory_hole: Some((memory::MEM_HOLE_START_FRAME, memory::MEM_HOLE_FRAMES)),
            shared_size: memory::SHARED_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    FramePool(#[from] FramePoolError),
    #[error(transparent)]
    Paging(#[from] PagingError),
    #[error("kernel pool cannot host {frames} bookkeeping frame(s) for the process pool")]
    NoBookkeeping { frames: u32 },
}

/// The kernel's paging state together with its address space.
pub struct MemorySystem<M: Mmu> {
    paging: Paging<M>,
    address_space: PageTableManager,
}

impl<M: Mmu> MemorySystem<M> {
    /// Brings up frame pools and paging on `mmu`.
    ///
    /// # Errors
    /// Fails if a pool cannot be registered or the kernel pool runs dry.
    ///
    /// # Safety
    /// - `mapper` must reach the kernel pool's frames, which must be unused.
    /// - `mmu` must be the executing CPU (or a faithful model of it) with
    ///   paging still disabled, and the running code must live in the first
    ///   4 MiB.
    pub unsafe fn init<P: PhysMapper>(
        mmu: M,
        mapper: &P,
        layout: &MemoryLayout,
    ) -> Result<Self, BootError> {
        let mut frames = FramePools::new();
        // SAFETY: Forwarded to the caller.
        let kernel_pool = unsafe {
            frames.create(
                mapper,
                layout.kernel_pool_start,
                layout.kernel_pool_frames,
                None,
                0,
            )
        }?;

        let info_frames = bitmap_frames_needed(layout.process_pool_frames);
        let info = frames
            .pool_mut(kernel_pool)
            .and_then(|pool| pool.allocate(info_frames))
            .ok_or(BootError::NoBookkeeping {
                frames: info_frames,
            })?;

        // SAFETY: The bookkeeping frames were just allocated for this purpose.
        let process_pool = unsafe {
            frames.create(
                mapper,
                layout.process_pool_start,
                layout.process_pool_frames,
                Some(info),
                info_frames,
            )
        }?;

        if let Some((first, count)) = layout.memory_hole
            && let Some(pool) = frames.pool_mut(process_pool)
        {
            pool.reserve(first, count, true);
            info!("reserved memory hole {}..{}", first.base(), (first + count).base());
        }

        let mut paging = Paging::configure(mmu, frames, kernel_pool, process_pool, layout.shared_size);
        let address_space = PageTableManager::new(&mut paging)?;
        // SAFETY: Forwarded to the caller; the running code is identity-mapped.
        unsafe {
            address_space.activate(&mut paging);
            paging.enable();
        }

        Ok(Self {
            paging,
            address_space,
        })
    }

    /// Registers a new virtual memory pool backed by the process pool.
    ///
    /// # Errors
    /// See [`PageTableManager::create_region`].
    pub fn create_region(&mut self, base: VirtualAddress, size: u32) -> Result<RegionId, VmPoolError> {
        let pool = self.paging.process_pool();
        self.address_space.create_region(base, size, pool)
    }

    /// Reserves `size` bytes in region `id`.
    ///
    /// # Errors
    /// See [`PageTableManager::allocate`].
    pub fn allocate(&mut self, id: RegionId, size: u32) -> Result<VirtualAddress, VmPoolError> {
        self.address_space.allocate(&mut self.paging, id, size)
    }

    /// # Errors
    /// See [`PageTableManager::release`].
    pub fn release(&mut self, id: RegionId, start: VirtualAddress) -> Result<(), VmPoolError> {
        self.address_space.release(&mut self.paging, id, start)
    }

    /// See [`PageTableManager::free_page`].
    pub fn free_page(&mut self, page: PageNumber) {
        self.address_space.free_page(&mut self.paging, page);
    }

    #[must_use]
    pub fn is_legitimate(&self, address: VirtualAddress) -> bool {
        self.address_space.is_legitimate(&self.paging, address)
    }

    /// # Errors
    /// See [`PageTableManager::handle_fault`].
    pub fn handle_fault(&mut self, address: VirtualAddress, registers: &Registers) -> Result<(), FaultError> {
        self.address_space
            .handle_fault(&mut self.paging, address, registers)
    }

    /// Handles the fault whose address the CPU left in CR2.
    ///
    /// # Errors
    /// See [`PageTableManager::handle_fault`].
    pub fn handle_page_fault(&mut self, registers: &Registers) -> Result<(), FaultError> {
        let address = self.paging.mmu().cr2().fault_address();
        self.handle_fault(address, registers)
    }

    #[inline]
    #[must_use]
    pub const fn paging(&self) -> &Paging<M> {
        &self.paging
    }

    #[inline]
    pub const fn paging_mut(&mut self) -> &mut Paging<M> {
        &mut self.paging
    }

    #[inline]
    #[must_use]
    pub const fn address_space(&self) -> &PageTableManager {
        &self.address_space
    }

    #[inline]
    pub const fn address_space_mut(&mut self) -> &mut PageTableManager {
        &mut self.address_space
    }
}

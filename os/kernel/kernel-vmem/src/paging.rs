//! # Process-Wide Paging State
//!
//! [`Paging`] owns everything every address space shares: the hardware
//! [`Mmu`], the frame pool registry, which pools back page tables versus
//! user data, the record of the active directory and whether translation is
//! switched on. Whoever holds `&mut Paging` is the single writer.

use crate::mmu::Mmu;
use kernel_alloc::registry::{FramePools, PoolId};
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE};
use kernel_registers::cr3::Cr3;
use log::info;

/// Bytes covered by the identity map every address space carries.
pub const IDENTITY_MAPPED_BYTES: u32 = 1024 * PAGE_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum PagingError {
    #[error("frame pool {pool:?} has no free frame left")]
    OutOfFrames { pool: PoolId },
}

pub struct Paging<M: Mmu> {
    mmu: M,
    frames: FramePools,
    kernel_pool: PoolId,
    process_pool: PoolId,
    shared_size: u32,
    active: Option<FrameNumber>,
    enabled: bool,
}

impl<M: Mmu> Paging<M> {
    /// Records the pools backing page tables (`kernel_pool`, must be
    /// identity-mapped) and demand-paged data (`process_pool`).
    ///
    /// # Panics
    /// Panics if either pool is not registered in `frames`, if
    /// `shared_size` exceeds the identity-mapped range, or if the kernel pool
    /// lies outside the shared region.
    pub fn configure(
        mmu: M,
        frames: FramePools,
        kernel_pool: PoolId,
        process_pool: PoolId,
        shared_size: u32,
    ) -> Self {
        assert!(
            shared_size <= IDENTITY_MAPPED_BYTES,
            "shared region of {shared_size:#x} bytes exceeds the identity map"
        );
        let Some(kernel) = frames.pool(kernel_pool) else {
            panic!("kernel pool {kernel_pool:?} is not registered");
        };
        assert!(
            kernel.end().base().as_u32() <= shared_size,
            "kernel pool must lie in the shared region"
        );
        assert!(
            frames.pool(process_pool).is_some(),
            "process pool {process_pool:?} is not registered"
        );

        info!("configured paging (shared region {shared_size:#x} bytes)");
        Self {
            mmu,
            frames,
            kernel_pool,
            process_pool,
            shared_size,
            active: None,
            enabled: false,
        }
    }

    /// Turns on address translation.
    ///
    /// # Safety
    /// The active directory must identity-map all code and data in use.
    ///
    /// # Panics
    /// Panics if no directory has been loaded.
    pub unsafe fn enable(&mut self) {
        assert!(self.active.is_some(), "no page directory loaded");
        let cr0 = self.mmu.cr0().with_pg_paging(true);
        // SAFETY: Forwarded to the caller.
        unsafe { self.mmu.set_cr0(cr0) };
        self.enabled = true;
        info!("paging enabled");
    }

    /// Makes the directory in `directory` the active one.
    ///
    /// # Safety
    /// `directory` must hold a complete page directory.
    pub(crate) unsafe fn load(&mut self, directory: FrameNumber) {
        // SAFETY: Forwarded to the caller.
        unsafe { self.mmu.set_cr3(Cr3::from_directory(directory)) };
        self.active = Some(directory);
        info!("loaded page directory at {}", directory.base());
    }

    pub(crate) fn allocate_frame(&mut self, pool: PoolId) -> Result<FrameNumber, PagingError> {
        self.frames
            .pool_mut(pool)
            .and_then(|p| p.allocate(1))
            .ok_or(PagingError::OutOfFrames { pool })
    }

    #[inline]
    #[must_use]
    pub const fn mmu(&self) -> &M {
        &self.mmu
    }

    #[inline]
    pub const fn mmu_mut(&mut self) -> &mut M {
        &mut self.mmu
    }

    #[inline]
    #[must_use]
    pub const fn frames(&self) -> &FramePools {
        &self.frames
    }

    #[inline]
    pub const fn frames_mut(&mut self) -> &mut FramePools {
        &mut self.frames
    }

    #[inline]
    #[must_use]
    pub const fn kernel_pool(&self) -> PoolId {
        self.kernel_pool
    }

    #[inline]
    #[must_use]
    pub const fn process_pool(&self) -> PoolId {
        self.process_pool
    }

    /// Bytes at the bottom of every address space that all of them share.
    #[inline]
    #[must_use]
    pub const fn shared_size(&self) -> u32 {
        self.shared_size
    }

    /// Frame of the directory currently loaded in CR3.
    #[inline]
    #[must_use]
    pub const fn active_directory(&self) -> Option<FrameNumber> {
        self.active
    }

    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

//! # Frame Pool Registry
//!
//! Keeps every [`ContFramePool`] of the system so that a frame can be given
//! back without knowing which pool handed it out. Pools are stored inline in
//! a fixed-capacity arena, addressed by [`PoolId`] and kept in registration
//! order. There is no removal.

use crate::frame_pool::ContFramePool;
use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::FrameNumber;
use log::{info, warn};

/// Maximum number of pools a registry can hold.
pub const MAX_POOLS: usize = 8;

/// Stable handle of a registered pool.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PoolId(usize);

#[derive(Debug, thiserror::Error)]
pub enum FramePoolError {
    #[error("frame pool registry is full ({} pools)", MAX_POOLS)]
    RegistryFull,
    #[error("frames {first}..{end} overlap an already registered pool")]
    Overlap { first: FrameNumber, end: FrameNumber },
}

/// Registry of all frame pools.
pub struct FramePools {
    pools: [Option<ContFramePool>; MAX_POOLS],
    len: usize,
}

impl FramePools {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pools: [const { None }; MAX_POOLS],
            len: 0,
        }
    }

    /// Adds an already constructed pool.
    ///
    /// # Errors
    /// [`FramePoolError::RegistryFull`] when all slots are used,
    /// [`FramePoolError::Overlap`] when the pool's range intersects a
    /// registered one.
    pub fn register(&mut self, pool: ContFramePool) -> Result<PoolId, FramePoolError> {
        self.check_slot(pool.base(), pool.frame_count())?;
        let id = PoolId(self.len);
        info!(
            "registered frame pool {} for frames {}..{}",
            id.0,
            pool.base(),
            pool.end()
        );
        self.pools[self.len] = Some(pool);
        self.len += 1;
        Ok(id)
    }

    /// Constructs a pool and registers it in one step.
    ///
    /// The range is validated before the bitmap is touched, so a rejected
    /// pool leaves the bookkeeping memory unchanged.
    ///
    /// # Errors
    /// See [`FramePools::register`].
    ///
    /// # Safety
    /// See [`ContFramePool::new`].
    pub unsafe fn create<P: PhysMapper>(
        &mut self,
        mapper: &P,
        base: FrameNumber,
        frame_count: u32,
        info_frame: Option<FrameNumber>,
        info_count: u32,
    ) -> Result<PoolId, FramePoolError> {
        self.check_slot(base, frame_count)?;
        // SAFETY: Forwarded to the caller.
        let pool = unsafe { ContFramePool::new(mapper, base, frame_count, info_frame, info_count) };
        self.register(pool)
    }

    #[must_use]
    pub fn pool(&self, id: PoolId) -> Option<&ContFramePool> {
        self.pools.get(id.0).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn pool_mut(&mut self, id: PoolId) -> Option<&mut ContFramePool> {
        self.pools.get_mut(id.0).and_then(Option::as_mut)
    }

    /// First registered pool whose range contains `frame`.
    #[must_use]
    pub fn owner(&self, frame: FrameNumber) -> Option<PoolId> {
        self.iter()
            .position(|pool| pool.contains(frame))
            .map(PoolId)
    }

    /// Frees the run starting at `frame` in whichever pool manages it.
    ///
    /// Frames that no pool claims are ignored.
    pub fn release(&mut self, frame: FrameNumber) {
        match self.owner(frame).and_then(|id| self.pool_mut(id)) {
            Some(pool) => pool.release(frame),
            None => warn!("release of frame {frame} that no pool manages"),
        }
    }

    /// Registered pools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ContFramePool> {
        self.pools[..self.len].iter().flatten()
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_slot(&self, base: FrameNumber, frame_count: u32) -> Result<(), FramePoolError> {
        if self.len == MAX_POOLS {
            return Err(FramePoolError::RegistryFull);
        }
        let end = base + frame_count;
        if self.iter().any(|pool| base < pool.end() && pool.base() < end) {
            return Err(FramePoolError::Overlap { first: base, end });
        }
        Ok(())
    }
}

impl Default for FramePools {
    fn default() -> Self {
        Self::new()
    }
}

//! # Physical Frame Allocation
//!
//! Physical memory is handed out in runs of contiguous 4 KiB frames by
//! [`ContFramePool`](frame_pool::ContFramePool)s. Each pool manages one
//! range of frames; all pools of the system are kept in a
//! [`FramePools`](registry::FramePools) registry so a run can be released
//! knowing nothing but its first frame.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ FramePools (registry, release dispatch)  │
//! └──────┬──────────────────────┬────────────┘
//!        │                      │
//! ┌──────▼──────────┐   ┌───────▼──────────┐
//! │ kernel pool     │   │ process pool     │
//! │ bitmap in self  │   │ bitmap in kernel │
//! └─────────────────┘   └──────────────────┘
//! ```
//!
//! Bitmaps are reached through a [`PhysMapper`](phys_mapper::PhysMapper).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_alloc::phys_mapper::IdentityPhysMapper;
//! use kernel_alloc::registry::FramePools;
//! use kernel_memory_addresses::FrameNumber;
//!
//! let mut pools = FramePools::new();
//! let kernel = unsafe {
//!     pools.create(&IdentityPhysMapper, FrameNumber::new(512), 512, None, 0)
//! }?;
//! let first = pools.pool_mut(kernel).and_then(|pool| pool.allocate(3));
//! if let Some(first) = first {
//!     pools.release(first);
//! }
//! # Ok::<(), kernel_alloc::registry::FramePoolError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_pool;
pub mod phys_mapper;
pub mod registry;

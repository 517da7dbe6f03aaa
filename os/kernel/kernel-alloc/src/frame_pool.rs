//! # Contiguous Frame Pool
//!
//! A first-fit allocator for runs of physically contiguous 4 KiB frames.
//!
//! Every managed frame carries a 2-bit state in a bitmap, four frames per
//! byte, frame `i` of the pool occupying bits `2*(i%4) .. 2*(i%4)+2` of byte
//! `i/4`:
//!
//! | Bits | State |
//! |------|-------|
//! | `00` | [`FrameState::Free`] |
//! | `01` | [`FrameState::Allocated`] (continuation of a run) |
//! | `10` | [`FrameState::OffLimits`] (never handed out, never released) |
//! | `11` | [`FrameState::HeadOfSequence`] (first frame of a run) |
//!
//! Marking the first frame of each run lets [`ContFramePool::release`] free a
//! whole run given only its first frame, without recording run lengths.
//!
//! The bitmap lives in physical memory. It is either hosted in the first
//! frames of the pool itself, which are then marked off limits, or in frames
//! owned by another pool (used when the kernel pool keeps the bookkeeping of a
//! much larger process pool).

use crate::phys_mapper::PhysMapper;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE};
use log::debug;

/// Number of frames whose state fits into a single bookkeeping frame.
pub const FRAMES_PER_INFO_FRAME: u32 = PAGE_SIZE * 4;

/// Number of bookkeeping frames needed for a pool of `frame_count` frames.
///
/// ```rust
/// # use kernel_alloc::frame_pool::bitmap_frames_needed;
/// assert_eq!(bitmap_frames_needed(1), 1);
/// assert_eq!(bitmap_frames_needed(16 * 1024), 1);
/// assert_eq!(bitmap_frames_needed(16 * 1024 + 1), 2);
/// assert_eq!(bitmap_frames_needed(7168), 1);
/// ```
#[inline]
#[must_use]
pub const fn bitmap_frames_needed(frame_count: u32) -> u32 {
    frame_count.div_ceil(FRAMES_PER_INFO_FRAME)
}

/// Allocation state of a single frame.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameState {
    Free = 0b00,
    Allocated = 0b01,
    OffLimits = 0b10,
    HeadOfSequence = 0b11,
}

impl FrameState {
    #[inline]
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Free,
            0b01 => Self::Allocated,
            0b10 => Self::OffLimits,
            _ => Self::HeadOfSequence,
        }
    }
}

/// Frame pool over the absolute range `base .. base + frame_count`.
///
/// ### Invariants
/// - Every frame is in exactly one [`FrameState`].
/// - An allocated run is one `HeadOfSequence` frame followed by zero or more
///   `Allocated` frames; runs never include `OffLimits` frames.
/// - Self-hosted bookkeeping frames are `OffLimits` for the pool's lifetime.
pub struct ContFramePool {
    base: FrameNumber,
    frame_count: u32,
    bitmap: &'static mut [u8],
}

impl ContFramePool {
    /// Builds a pool over `frame_count` frames starting at `base`.
    ///
    /// With `info_frame == None` the bitmap is placed at `base` and the frames
    /// it occupies are reserved off limits. Otherwise it is placed at
    /// `info_frame`, which must lie outside this pool, and `info_count` must
    /// cover [`bitmap_frames_needed`]`(frame_count)` frames. All other frames
    /// start out free.
    ///
    /// # Safety
    /// The bookkeeping frames must be reachable through `mapper`, must stay
    /// valid for the rest of the program and must not be used by anything
    /// else.
    ///
    /// # Panics
    /// Panics if `frame_count` is zero, if the bitmap does not fit the
    /// bookkeeping frames, or if a self-hosted bitmap would consume the
    /// whole pool.
    pub unsafe fn new<P: PhysMapper>(
        mapper: &P,
        base: FrameNumber,
        frame_count: u32,
        info_frame: Option<FrameNumber>,
        info_count: u32,
    ) -> Self {
        assert!(frame_count > 0, "a frame pool needs at least one frame");
        let needed = bitmap_frames_needed(frame_count);
        assert!(
            info_frame.is_none() || info_count >= needed,
            "{info_count} bookkeeping frames cannot describe {frame_count} frames"
        );
        let self_hosted = info_frame.is_none();
        assert!(
            !self_hosted || needed < frame_count,
            "bookkeeping would consume the whole pool"
        );

        let bitmap_frame = info_frame.unwrap_or(base);
        let bytes = frame_count.div_ceil(4) as usize;
        // SAFETY: Caller guarantees exclusive, valid bookkeeping memory.
        let bitmap = unsafe { mapper.phys_to_slice(bitmap_frame.base(), bytes) };
        bitmap.fill(0);

        let mut pool = Self {
            base,
            frame_count,
            bitmap,
        };

        if self_hosted {
            pool.reserve(base, needed, true);
        }

        debug!(
            "frame pool {base}..{} constructed ({frame_count} frames, bitmap at {bitmap_frame})",
            base + frame_count
        );
        pool
    }

    /// First frame managed by this pool.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> FrameNumber {
        self.base
    }

    /// Number of frames managed by this pool.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// One past the last managed frame.
    #[inline]
    #[must_use]
    pub fn end(&self) -> FrameNumber {
        self.base + self.frame_count
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, frame: FrameNumber) -> bool {
        frame >= self.base && frame < self.end()
    }

    /// State of `frame`, or `None` if the pool does not manage it.
    #[must_use]
    pub fn state(&self, frame: FrameNumber) -> Option<FrameState> {
        self.contains(frame).then(|| self.state_at(frame - self.base))
    }

    /// Number of frames currently free.
    #[must_use]
    pub fn free_frames(&self) -> u32 {
        (0..self.frame_count)
            .filter(|&i| self.state_at(i) == FrameState::Free)
            .fold(0, |n, _| n + 1)
    }

    /// Allocates `n` contiguous frames, returning the first one.
    ///
    /// First fit: the scan always starts at the beginning of the pool.
    /// Returns `None` for `n == 0` or when no free run of length `n` exists.
    pub fn allocate(&mut self, n: u32) -> Option<FrameNumber> {
        if n == 0 || n > self.frame_count {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        for i in 0..self.frame_count {
            if self.state_at(i) == FrameState::Free {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len == n {
                    self.mark_run(run_start, n, FrameState::HeadOfSequence, FrameState::Allocated);
                    let first = self.base + run_start;
                    debug!("allocated {n} frame(s) at {first}");
                    return Some(first);
                }
            } else {
                run_len = 0;
            }
        }

        None
    }

    /// Marks `n` frames starting at the absolute frame `first` as in use.
    ///
    /// With `off_limits` every frame becomes [`FrameState::OffLimits`];
    /// otherwise the range becomes a regular run that [`release`](Self::release)
    /// can later free. Previous states are overwritten.
    ///
    /// # Panics
    /// Panics if the range is not fully inside the pool.
    pub fn reserve(&mut self, first: FrameNumber, n: u32, off_limits: bool) {
        assert!(
            self.contains(first)
                && (first - self.base)
                    .checked_add(n)
                    .is_some_and(|end| end <= self.frame_count),
            "reserved range {first}+{n} outside pool {}..{}",
            self.base,
            self.end()
        );
        if n == 0 {
            return;
        }

        let start = first - self.base;
        if off_limits {
            self.mark_run(start, n, FrameState::OffLimits, FrameState::OffLimits);
        } else {
            self.mark_run(start, n, FrameState::HeadOfSequence, FrameState::Allocated);
        }
        debug!("reserved {n} frame(s) at {first} (off limits: {off_limits})");
    }

    /// Frees the run whose first frame is `first`.
    ///
    /// A no-op unless `first` is the head of a run. Walks forward freeing
    /// continuation frames and stops at the first frame that is not
    /// [`FrameState::Allocated`] or at the end of the pool.
    pub fn release(&mut self, first: FrameNumber) {
        if self.state(first) != Some(FrameState::HeadOfSequence) {
            return;
        }

        let start = first - self.base;
        self.set_state(start, FrameState::Free);
        let mut freed = 1;
        let mut i = start + 1;
        while i < self.frame_count && self.state_at(i) == FrameState::Allocated {
            self.set_state(i, FrameState::Free);
            freed += 1;
            i += 1;
        }
        debug!("released {freed} frame(s) at {first}");
    }

    fn mark_run(&mut self, start: u32, n: u32, head: FrameState, rest: FrameState) {
        self.set_state(start, head);
        for i in start + 1..start + n {
            self.set_state(i, rest);
        }
    }

    #[inline]
    fn state_at(&self, index: u32) -> FrameState {
        let byte = self.bitmap[(index / 4) as usize];
        FrameState::from_bits(byte >> ((index % 4) * 2))
    }

    #[inline]
    fn set_state(&mut self, index: u32, state: FrameState) {
        let shift = (index % 4) * 2;
        let byte = &mut self.bitmap[(index / 4) as usize];
        *byte = (*byte & !(0b11 << shift)) | ((state as u8) << shift);
    }
}

impl core::fmt::Debug for ContFramePool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContFramePool")
            .field("base", &self.base)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

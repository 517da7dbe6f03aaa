//! # Virtual Memory Pools
//!
//! A [`VmPool`] hands out page-granular ranges of one virtual window. It only
//! reserves address space; frames are attached lazily by the page-fault
//! handler the first time a reserved page is touched.
//!
//! ```text
//! base                                                  base + size
//! ┌──────────┬─────────────┬──────┬──────────────┬──────────────┐
//! │ metadata │  region A   │ free │   region B   │     free     │
//! └──────────┴─────────────┴──────┴──────────────┴──────────────┘
//! ```
//!
//! ## Descriptor table
//!
//! The first page of the window holds the pool's descriptor table: up to
//! [`MAX_REGIONS`] `(first_page, byte_size)` pairs of two 32-bit words each,
//! in allocation order. The table needs no memory besides the window itself,
//! and the page is never handed out.
//!
//! The table is read and written through an [`Mmu`] at its linear address,
//! so every method that touches it is `unsafe`: the address space owning the
//! pool must be the active one, and the metadata page must be mapped before
//! the first descriptor is written and stay mapped while any descriptor is
//! live. [`PageTableManager`](crate::PageTableManager) upholds both.

use crate::mmu::Mmu;
use crate::paging::IDENTITY_MAPPED_BYTES;
use crate::self_map::SELF_MAP_BASE;
use kernel_alloc::registry::PoolId;
use kernel_memory_addresses::{PAGE_SIZE, PageNumber, VirtualAddress, is_page_multiple};
use log::{info, warn};

/// Bytes occupied by one descriptor in the metadata page.
pub const DESCRIPTOR_SIZE: u32 = 8;

/// Number of descriptors fitting into the metadata page.
pub const MAX_REGIONS: u32 = PAGE_SIZE / DESCRIPTOR_SIZE;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum VmPoolError {
    #[error("size is not a multiple of the page size")]
    UnalignedSize,
    #[error("zero-sized request")]
    EmptyRequest,
    #[error("no free virtual range large enough")]
    NoSpace,
    #[error("region table is full")]
    TableFull,
    #[error("invalid region of memory at {address}")]
    InvalidRegion { address: VirtualAddress },
    #[error("window base is not page aligned")]
    MisalignedWindow,
    #[error("window must span at least two pages")]
    WindowTooSmall,
    #[error("window overlaps the identity map or the self-map window")]
    WindowOutOfRange,
    #[error("window overlaps an already registered pool")]
    RegionOverlap,
    #[error("no such virtual memory pool")]
    UnknownPool,
    #[error("address space already holds the maximum number of pools")]
    RegistryFull,
    #[error("address space is not the active one")]
    NotActive,
    #[error("no frame left for the pool's metadata page")]
    OutOfFrames,
}

/// One allocated range: its first page and its length in bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Region {
    first_page: PageNumber,
    byte_size: u32,
}

const _: () = assert!(size_of::<Region>() == DESCRIPTOR_SIZE as usize);

impl Region {
    #[inline]
    #[must_use]
    pub const fn first_page(&self) -> PageNumber {
        self.first_page
    }

    #[inline]
    #[must_use]
    pub const fn byte_size(&self) -> u32 {
        self.byte_size
    }

    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        self.byte_size / PAGE_SIZE
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.first_page.base()
    }

    /// One past the last page.
    #[inline]
    #[must_use]
    pub fn end_page(&self) -> PageNumber {
        self.first_page + self.page_count()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, address: VirtualAddress) -> bool {
        let offset = address.as_u32().wrapping_sub(self.start().as_u32());
        address >= self.start() && offset < self.byte_size
    }
}

/// Allocator for one window of virtual address space.
///
/// ### Invariants
/// - Descriptors never overlap and never cover the metadata page.
/// - Descriptors are kept contiguous in allocation order.
/// - The window lies between the identity map and the self-map window.
pub struct VmPool {
    base: VirtualAddress,
    size: u32,
    frame_pool: PoolId,
    len: u32,
}

impl VmPool {
    /// Creates a pool over `[base, base + size)` whose pages are backed by
    /// frames from `frame_pool`.
    ///
    /// # Errors
    /// - [`VmPoolError::MisalignedWindow`] if `base` is not page aligned.
    /// - [`VmPoolError::UnalignedSize`] if `size` is not a whole number of pages.
    /// - [`VmPoolError::WindowTooSmall`] if fewer than two pages remain.
    /// - [`VmPoolError::WindowOutOfRange`] if the window starts inside the
    ///   identity-mapped first 4 MiB, wraps, or reaches the self-map window.
    pub fn new(base: VirtualAddress, size: u32, frame_pool: PoolId) -> Result<Self, VmPoolError> {
        if !base.is_page_aligned() {
            return Err(VmPoolError::MisalignedWindow);
        }
        if !is_page_multiple(size) {
            return Err(VmPoolError::UnalignedSize);
        }
        if size < 2 * PAGE_SIZE {
            return Err(VmPoolError::WindowTooSmall);
        }
        if base.as_u32() < IDENTITY_MAPPED_BYTES {
            return Err(VmPoolError::WindowOutOfRange);
        }
        match base.checked_add(size) {
            Some(end) if end <= SELF_MAP_BASE => {}
            _ => return Err(VmPoolError::WindowOutOfRange),
        }

        info!("constructed VM pool {base}+{size:#x}");
        Ok(Self {
            base,
            size,
            frame_pool,
            len: 0,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn frame_pool(&self) -> PoolId {
        self.frame_pool
    }

    /// Page holding the descriptor table.
    #[inline]
    #[must_use]
    pub const fn metadata_page(&self) -> PageNumber {
        self.base.page()
    }

    /// Number of live descriptors.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn first_usable_page(&self) -> PageNumber {
        self.base.page() + 1
    }

    fn end_page(&self) -> PageNumber {
        self.base.page() + self.size / PAGE_SIZE
    }

    /// Whether the windows of `self` and `other` intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.base.page() < other.end_page() && other.base.page() < self.end_page()
    }

    fn slot(&self, index: u32) -> VirtualAddress {
        self.base + index * DESCRIPTOR_SIZE
    }

    unsafe fn read_region<M: Mmu>(&self, mmu: &M, index: u32) -> Region {
        let at = self.slot(index);
        // SAFETY: Forwarded to the caller.
        let (first_page, byte_size) = unsafe { (mmu.read_word(at), mmu.read_word(at + 4)) };
        Region {
            first_page: PageNumber::new(first_page),
            byte_size,
        }
    }

    unsafe fn write_region<M: Mmu>(&self, mmu: &mut M, index: u32, region: Region) {
        let at = self.slot(index);
        // SAFETY: Forwarded to the caller.
        unsafe {
            mmu.write_word(at, region.first_page.as_u32());
            mmu.write_word(at + 4, region.byte_size);
        }
    }

    /// Live descriptors in allocation order.
    ///
    /// # Safety
    /// See the [module documentation](self).
    pub unsafe fn regions<'a, M: Mmu>(&'a self, mmu: &'a M) -> impl Iterator<Item = Region> + 'a {
        // SAFETY: Forwarded to the caller.
        (0..self.len).map(move |i| unsafe { self.read_region(mmu, i) })
    }

    /// Finds the lowest candidate run of `count` free pages.
    ///
    /// Starting past the metadata page, the candidate is pushed past every
    /// descriptor it intersects until a full pass moves it no more. Every
    /// push moves past one descriptor for good, so the scan settles within
    /// `len + 1` passes however the table is ordered.
    ///
    /// # Safety
    /// See the [module documentation](self).
    #[must_use]
    pub unsafe fn find_free_pages<M: Mmu>(&self, mmu: &M, count: u32) -> Option<PageNumber> {
        if count == 0 {
            return None;
        }

        let end = self.end_page();
        let mut candidate = self.first_usable_page();
        for _ in 0..=self.len {
            let mut moved = false;
            // SAFETY: Forwarded to the caller.
            for region in unsafe { self.regions(mmu) } {
                let intersects = candidate < region.end_page()
                    && region.first_page().as_u32() < candidate.as_u32() + count;
                if intersects {
                    candidate = region.end_page();
                    moved = true;
                }
            }

            if end < candidate || end - candidate < count {
                return None;
            }
            if !moved {
                return Some(candidate);
            }
        }
        None
    }

    /// Reserves `size` bytes of address space and records the descriptor in
    /// the metadata page.
    ///
    /// # Errors
    /// - [`VmPoolError::EmptyRequest`] for `size == 0`.
    /// - [`VmPoolError::UnalignedSize`] if `size` is not a page multiple.
    /// - [`VmPoolError::TableFull`] if no descriptor slot is left.
    /// - [`VmPoolError::NoSpace`] if no free run is large enough.
    ///
    /// # Safety
    /// See the [module documentation](self).
    pub unsafe fn allocate<M: Mmu>(
        &mut self,
        mmu: &mut M,
        size: u32,
    ) -> Result<VirtualAddress, VmPoolError> {
        if size == 0 {
            return Err(VmPoolError::EmptyRequest);
        }
        if !is_page_multiple(size) {
            return Err(VmPoolError::UnalignedSize);
        }
        if self.len == MAX_REGIONS {
            return Err(VmPoolError::TableFull);
        }

        // SAFETY: Forwarded to the caller.
        let Some(first_page) = (unsafe { self.find_free_pages(mmu, size / PAGE_SIZE) }) else {
            warn!("VM pool {} cannot fit {size:#x} bytes", self.base);
            return Err(VmPoolError::NoSpace);
        };

        let region = Region {
            first_page,
            byte_size: size,
        };
        // SAFETY: Forwarded to the caller.
        unsafe { self.write_region(mmu, self.len, region) };
        self.len += 1;

        let start = first_page.base();
        info!("allocated region {start}+{size:#x}");
        Ok(start)
    }

    /// Removes the descriptor starting at `start`'s page and returns it.
    ///
    /// Later descriptors move down one slot. Unmapping the region's pages is
    /// up to the caller.
    ///
    /// # Errors
    /// [`VmPoolError::InvalidRegion`] if no region starts there.
    ///
    /// # Safety
    /// See the [module documentation](self).
    pub unsafe fn release<M: Mmu>(
        &mut self,
        mmu: &mut M,
        start: VirtualAddress,
    ) -> Result<Region, VmPoolError> {
        let page = start.page();
        // SAFETY: Forwarded to the caller.
        let found = (0..self.len)
            .map(|i| (i, unsafe { self.read_region(mmu, i) }))
            .find(|(_, region)| region.first_page() == page);
        let Some((index, region)) = found else {
            warn!("invalid region of memory at {start}");
            return Err(VmPoolError::InvalidRegion { address: start });
        };

        for i in index + 1..self.len {
            // SAFETY: Forwarded to the caller.
            unsafe {
                let next = self.read_region(mmu, i);
                self.write_region(mmu, i - 1, next);
            }
        }
        self.len -= 1;

        info!("released region {}+{:#x}", region.start(), region.byte_size());
        Ok(region)
    }

    /// Whether an access to `address` is backed by this pool.
    ///
    /// The metadata page counts as legitimate so the descriptor table can be
    /// demand-paged like any other page of the window.
    ///
    /// # Safety
    /// See the [module documentation](self).
    #[must_use]
    pub unsafe fn is_legitimate<M: Mmu>(&self, mmu: &M, address: VirtualAddress) -> bool {
        let offset = address.as_u32().wrapping_sub(self.base.as_u32());
        if address < self.base || offset >= self.size {
            return false;
        }
        if offset < PAGE_SIZE {
            return true;
        }
        // SAFETY: Forwarded to the caller.
        unsafe { self.regions(mmu) }.any(|r| r.contains(address))
    }
}

impl core::fmt::Debug for VmPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VmPool")
            .field("base", &self.base)
            .field("size", &self.size)
            .field("frame_pool", &self.frame_pool)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_registers::cr0::Cr0;
    use kernel_registers::cr2::Cr2;
    use kernel_registers::cr3::Cr3;
    use proptest::prelude::*;
    use std::collections::HashMap;

    const BASE: u32 = 512 * 1024 * 1024;

    /// Word store standing in for the pool's metadata page. Any access
    /// elsewhere fails the test.
    struct MetadataPage {
        page: PageNumber,
        words: HashMap<u32, u32>,
        writes: usize,
    }

    impl Mmu for MetadataPage {
        fn cr0(&self) -> Cr0 {
            Cr0::new()
        }

        unsafe fn set_cr0(&mut self, _cr0: Cr0) {}

        fn cr2(&self) -> Cr2 {
            Cr2::default()
        }

        fn cr3(&self) -> Cr3 {
            Cr3::new()
        }

        unsafe fn set_cr3(&mut self, _cr3: Cr3) {}

        unsafe fn read_word(&self, at: VirtualAddress) -> u32 {
            assert_eq!(at.page(), self.page, "read outside metadata page at {at}");
            self.words.get(&at.as_u32()).copied().unwrap_or(0)
        }

        unsafe fn write_word(&mut self, at: VirtualAddress, value: u32) {
            assert_eq!(at.page(), self.page, "write outside metadata page at {at}");
            self.words.insert(at.as_u32(), value);
            self.writes += 1;
        }
    }

    struct Fixture {
        pool: VmPool,
        memory: MetadataPage,
    }

    impl Fixture {
        fn new(pages: u32) -> Self {
            let pool = VmPool::new(VirtualAddress::new(BASE), pages * PAGE_SIZE, test_pool_id())
                .expect("pool");
            let memory = MetadataPage {
                page: pool.metadata_page(),
                words: HashMap::new(),
                writes: 0,
            };
            Self { pool, memory }
        }

        fn allocate(&mut self, size: u32) -> Result<VirtualAddress, VmPoolError> {
            unsafe { self.pool.allocate(&mut self.memory, size) }
        }

        fn release(&mut self, start: VirtualAddress) -> Result<Region, VmPoolError> {
            unsafe { self.pool.release(&mut self.memory, start) }
        }

        fn find(&self, count: u32) -> Option<PageNumber> {
            unsafe { self.pool.find_free_pages(&self.memory, count) }
        }

        fn is_legitimate(&self, address: VirtualAddress) -> bool {
            unsafe { self.pool.is_legitimate(&self.memory, address) }
        }

        fn starts(&self) -> Vec<VirtualAddress> {
            unsafe { self.pool.regions(&self.memory) }
                .map(|r| r.start())
                .collect()
        }

        fn word(&self, offset: u32) -> u32 {
            unsafe { self.memory.read_word(VirtualAddress::new(BASE + offset)) }
        }
    }

    fn test_pool_id() -> PoolId {
        use kernel_alloc::phys_mapper::PhysMapper;
        use kernel_alloc::registry::FramePools;
        use kernel_memory_addresses::{FrameNumber, PhysicalAddress};

        struct Scratch(*mut u8);
        impl PhysMapper for Scratch {
            unsafe fn phys_to_mut<'a, T>(&self, _pa: PhysicalAddress) -> &'a mut T {
                unsafe { &mut *self.0.cast::<T>() }
            }

            unsafe fn phys_to_slice<'a>(&self, _pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
                assert!(len <= PAGE_SIZE as usize);
                unsafe { core::slice::from_raw_parts_mut(self.0, len) }
            }
        }

        let scratch = Scratch(vec![0u8; PAGE_SIZE as usize].leak().as_mut_ptr());
        let mut pools = FramePools::new();
        unsafe { pools.create(&scratch, FrameNumber::new(0), 4, Some(FrameNumber::new(100)), 1) }
            .expect("pool id")
    }

    fn page(n: u32) -> VirtualAddress {
        VirtualAddress::new(BASE + n * PAGE_SIZE)
    }

    #[test]
    fn descriptor_table_fills_one_page() {
        assert_eq!(MAX_REGIONS, 512);
        assert_eq!(MAX_REGIONS * DESCRIPTOR_SIZE, PAGE_SIZE);
    }

    #[test]
    fn descriptors_live_in_the_metadata_page() {
        let mut f = Fixture::new(16);
        assert_eq!(f.allocate(3 * PAGE_SIZE), Ok(page(1)));
        assert_eq!(f.allocate(PAGE_SIZE), Ok(page(4)));

        assert_eq!(f.word(0), page(1).page().as_u32());
        assert_eq!(f.word(4), 3 * PAGE_SIZE);
        assert_eq!(f.word(8), page(4).page().as_u32());
        assert_eq!(f.word(12), PAGE_SIZE);
        assert_eq!(f.pool.len(), 2);
    }

    #[test]
    fn failed_requests_leave_the_table_untouched() {
        let mut f = Fixture::new(4);
        assert_eq!(f.allocate(0), Err(VmPoolError::EmptyRequest));
        assert_eq!(f.allocate(100), Err(VmPoolError::UnalignedSize));
        assert_eq!(f.allocate(4 * PAGE_SIZE), Err(VmPoolError::NoSpace));
        assert_eq!(f.memory.writes, 0);
        assert!(f.pool.is_empty());
    }

    #[test]
    fn first_allocation_skips_metadata_page() {
        let mut f = Fixture::new(16);
        assert_eq!(f.allocate(PAGE_SIZE), Ok(page(1)));
        assert_eq!(f.allocate(3 * PAGE_SIZE), Ok(page(2)));
        assert_eq!(f.allocate(PAGE_SIZE), Ok(page(5)));
    }

    #[test]
    fn window_fills_up() {
        let mut f = Fixture::new(4);
        assert_eq!(f.allocate(3 * PAGE_SIZE), Ok(page(1)));
        assert_eq!(f.allocate(PAGE_SIZE), Err(VmPoolError::NoSpace));
    }

    #[test]
    fn window_validation() {
        let id = test_pool_id();
        assert_eq!(
            VmPool::new(VirtualAddress::new(BASE + 1), 4 * PAGE_SIZE, id).err(),
            Some(VmPoolError::MisalignedWindow)
        );
        assert_eq!(
            VmPool::new(VirtualAddress::new(BASE), PAGE_SIZE, id).err(),
            Some(VmPoolError::WindowTooSmall)
        );
        assert_eq!(
            VmPool::new(VirtualAddress::new(0xFFB0_0000), 0x0020_0000, id).err(),
            Some(VmPoolError::WindowOutOfRange)
        );
    }

    #[test]
    fn window_may_not_reuse_identity_mapped_memory() {
        let id = test_pool_id();
        assert_eq!(
            VmPool::new(VirtualAddress::new(0x0020_0000), 0x0010_0000, id).err(),
            Some(VmPoolError::WindowOutOfRange)
        );
        assert_eq!(
            VmPool::new(VirtualAddress::new(IDENTITY_MAPPED_BYTES - PAGE_SIZE), 4 * PAGE_SIZE, id)
                .err(),
            Some(VmPoolError::WindowOutOfRange)
        );
        assert!(VmPool::new(VirtualAddress::new(IDENTITY_MAPPED_BYTES), 4 * PAGE_SIZE, id).is_ok());
    }

    #[test]
    fn gap_left_by_release_is_reused() {
        let mut f = Fixture::new(16);
        let a = f.allocate(2 * PAGE_SIZE).expect("a");
        let b = f.allocate(2 * PAGE_SIZE).expect("b");
        f.release(a).expect("release");
        assert_eq!(f.allocate(PAGE_SIZE), Ok(a));
        assert_eq!(f.allocate(2 * PAGE_SIZE), Ok(b + 2 * PAGE_SIZE));
    }

    #[test]
    fn scan_repeats_when_table_order_differs_from_address_order() {
        let mut f = Fixture::new(16);
        let a = f.allocate(PAGE_SIZE).expect("a");
        let b = f.allocate(PAGE_SIZE).expect("b");
        let c = f.allocate(PAGE_SIZE).expect("c");
        f.release(a).expect("release a");
        f.release(b).expect("release b");
        let d = f.allocate(2 * PAGE_SIZE).expect("d");
        assert_eq!(d, page(1));
        // Table holds [page 3, page 1]: a single pass lands on page 3.
        assert_eq!(f.starts(), [c, d]);

        assert_eq!(f.find(1), Some(page(4).page()));
        assert_eq!(f.allocate(PAGE_SIZE), Ok(page(4)));
    }

    #[test]
    fn release_returns_the_whole_region() {
        let mut f = Fixture::new(64);
        let start = f.allocate(5 * PAGE_SIZE).expect("start");
        let region = f.release(start).expect("release");
        assert_eq!(region.first_page(), start.page());
        assert_eq!(region.page_count(), 5);
        assert!(f.pool.is_empty());
    }

    #[test]
    fn release_of_unknown_address_is_reported() {
        let mut f = Fixture::new(8);
        let a = f.allocate(2 * PAGE_SIZE).expect("a");
        let err = f.release(a + PAGE_SIZE);
        assert_eq!(err, Err(VmPoolError::InvalidRegion { address: a + PAGE_SIZE }));
        assert_eq!(f.starts(), [a]);
    }

    #[test]
    fn release_compacts_descriptors_in_order() {
        let mut f = Fixture::new(16);
        let a = f.allocate(PAGE_SIZE).expect("a");
        let b = f.allocate(PAGE_SIZE).expect("b");
        let c = f.allocate(PAGE_SIZE).expect("c");
        f.release(b).expect("release");
        assert_eq!(f.starts(), [a, c]);
        assert_eq!(f.word(8), c.page().as_u32());
    }

    #[test]
    fn legitimacy() {
        let mut f = Fixture::new(16);
        let a = f.allocate(2 * PAGE_SIZE).expect("a");
        assert!(f.is_legitimate(page(0)));
        assert!(f.is_legitimate(page(0) + 17));
        assert!(f.is_legitimate(a));
        assert!(f.is_legitimate(a + (2 * PAGE_SIZE - 1)));
        assert!(!f.is_legitimate(a + 2 * PAGE_SIZE));
        assert!(!f.is_legitimate(VirtualAddress::new(BASE - 1)));
        assert!(!f.is_legitimate(page(16)));
    }

    #[test]
    fn table_full() {
        let mut f = Fixture::new(MAX_REGIONS + 2);
        for _ in 0..MAX_REGIONS {
            f.allocate(PAGE_SIZE).expect("slot");
        }
        assert_eq!(f.allocate(PAGE_SIZE), Err(VmPoolError::TableFull));
    }

    proptest! {
        #[test]
        fn allocations_never_overlap(sizes in proptest::collection::vec(1u32..8, 1..24)) {
            let mut f = Fixture::new(128);
            let mut taken: Vec<(u32, u32)> = Vec::new();
            for pages in sizes {
                if let Ok(start) = f.allocate(pages * PAGE_SIZE) {
                    let s = start.page().as_u32();
                    for &(ts, tp) in &taken {
                        prop_assert!(s + pages <= ts || ts + tp <= s);
                    }
                    prop_assert!(f.is_legitimate(start));
                    prop_assert!(f.is_legitimate(start + (pages * PAGE_SIZE - 1)));
                    taken.push((s, pages));
                }
            }
        }

        #[test]
        fn interleaved_allocate_and_release_keep_the_table_consistent(
            ops in proptest::collection::vec((any::<bool>(), 1u32..6, any::<prop::sample::Index>()), 1..60)
        ) {
            let mut f = Fixture::new(48);
            let first = page(1).page().as_u32();
            let end = page(48).page().as_u32();
            let mut live: Vec<(VirtualAddress, u32)> = Vec::new();

            for (allocate, pages, pick) in ops {
                if allocate || live.is_empty() {
                    let Ok(start) = f.allocate(pages * PAGE_SIZE) else {
                        continue;
                    };
                    let s = start.page().as_u32();
                    prop_assert!(s >= first && s + pages <= end);
                    for &(other, other_pages) in &live {
                        let o = other.page().as_u32();
                        prop_assert!(s + pages <= o || o + other_pages <= s);
                    }
                    live.push((start, pages));
                } else {
                    let (start, pages) = live.remove(pick.index(live.len()));
                    let region = f.release(start).expect("live region");
                    prop_assert_eq!(region.page_count(), pages);
                    prop_assert!(!f.is_legitimate(start));
                }

                let expected: Vec<_> = live.iter().map(|&(start, _)| start).collect();
                prop_assert_eq!(f.starts(), expected);
            }
        }

        #[test]
        fn allocate_release_round_trip(pre in 0u32..6, pages in 1u32..8) {
            let mut f = Fixture::new(64);
            for _ in 0..pre {
                f.allocate(PAGE_SIZE).expect("pre");
            }
            let before = f.find(pages);
            let start = f.allocate(pages * PAGE_SIZE).expect("allocate");
            f.release(start).expect("release");
            let after = f.find(pages);
            prop_assert!(after.is_some());
            prop_assert!(after <= before);
        }
    }
}

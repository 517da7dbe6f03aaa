//! # Address Space (i686, self-mapped two-level tables)
//!
//! A [`PageTableManager`] owns one page directory and the [`VmPool`]s whose
//! windows are valid in it.
//!
//! ## Layout of a fresh directory
//!
//! | Slot        | Entry |
//! |-------------|-------|
//! | `0`         | page table identity-mapping the first 4 MiB |
//! | `1..=1022`  | not-present placeholder, filled on demand |
//! | `1023`      | the directory itself (self-map) |
//!
//! ## Demand paging
//!
//! Allocating from a [`VmPool`] only reserves addresses (and, on the first
//! allocation, backs the pool's metadata page). The first touch of
//! a reserved page faults; [`PageTableManager::handle_fault`] then installs a
//! page table (if the covering slot is empty) and a data frame, both taken
//! from the process pool, and the faulting instruction is retried.
//!
//! ## Safety
//!
//! Once paging is on, every table is accessed through its self-map address.
//! Those accesses are only meaningful for the directory that is currently
//! loaded, which is why most operations first check [`PageTableManager::is_active`].

use crate::fault::{FaultError, Registers};
use crate::mmu::Mmu;
use crate::page_entry_bits::PageEntryBits;
use crate::page_table::{DirectoryIndex, ENTRIES_PER_TABLE, ENTRY_SIZE, TableIndex, split_indices};
use crate::paging::{Paging, PagingError};
use crate::self_map::{self, SELF_MAP_INDEX};
use crate::vm_pool::{VmPool, VmPoolError};
use kernel_alloc::registry::PoolId;
use kernel_memory_addresses::{
    FrameNumber, PAGE_SIZE, PageNumber, PhysicalAddress, VirtualAddress,
};
use log::{debug, error, info, warn};

/// Number of [`VmPool`]s one address space can hold.
pub const MAX_VM_POOLS: usize = 16;

/// Handle of a [`VmPool`] registered with a [`PageTableManager`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RegionId(usize);

pub struct PageTableManager {
    directory: FrameNumber,
    pools: [Option<VmPool>; MAX_VM_POOLS],
    len: usize,
}

impl PageTableManager {
    /// Builds a new page directory from kernel-pool frames.
    ///
    /// The first 4 MiB are identity-mapped through one eagerly created page
    /// table, the last slot maps the directory onto itself and all other
    /// slots hold the placeholder.
    ///
    /// # Errors
    /// [`PagingError::OutOfFrames`] if the kernel pool cannot supply the two
    /// frames.
    pub fn new<M: Mmu>(paging: &mut Paging<M>) -> Result<Self, PagingError> {
        let kernel_pool = paging.kernel_pool();
        let directory = paging.allocate_frame(kernel_pool)?;
        let table = match paging.allocate_frame(kernel_pool) {
            Ok(table) => table,
            Err(e) => {
                paging.frames_mut().release(directory);
                return Err(e);
            }
        };

        let mmu = paging.mmu_mut();
        for i in 0..ENTRIES_PER_TABLE {
            let entry = PageEntryBits::mapping(FrameNumber::new(i));
            // SAFETY: Kernel pool frames are identity-mapped and freshly allocated.
            unsafe { write_physical(mmu, table, i, entry) };
        }

        for i in 0..ENTRIES_PER_TABLE {
            let entry = match i {
                0 => PageEntryBits::mapping(table),
                i if i == SELF_MAP_INDEX.as_u32() => PageEntryBits::mapping(directory),
                _ => PageEntryBits::placeholder(),
            };
            // SAFETY: As above.
            unsafe { write_physical(mmu, directory, i, entry) };
        }

        info!(
            "constructed page directory at {} (identity table at {})",
            directory.base(),
            table.base()
        );
        Ok(Self {
            directory,
            pools: [const { None }; MAX_VM_POOLS],
            len: 0,
        })
    }

    /// Frame holding the page directory.
    #[inline]
    #[must_use]
    pub const fn directory(&self) -> FrameNumber {
        self.directory
    }

    #[inline]
    #[must_use]
    pub fn is_active<M: Mmu>(&self, paging: &Paging<M>) -> bool {
        paging.active_directory() == Some(self.directory)
    }

    /// Loads this directory into CR3 and records it as the active one.
    ///
    /// # Safety
    /// If paging is enabled, the code performing the switch must remain
    /// mapped. The identity map of the first 4 MiB guarantees this for
    /// kernel code living there.
    pub unsafe fn activate<M: Mmu>(&self, paging: &mut Paging<M>) {
        // SAFETY: The directory was fully initialised by `new`.
        unsafe { paging.load(self.directory) };
    }

    /// Hands ownership of `pool` to this address space.
    ///
    /// # Errors
    /// - [`VmPoolError::RegistryFull`] if [`MAX_VM_POOLS`] pools are registered.
    /// - [`VmPoolError::RegionOverlap`] if its window intersects a registered pool.
    pub fn register_region(&mut self, pool: VmPool) -> Result<RegionId, VmPoolError> {
        if self.len == MAX_VM_POOLS {
            return Err(VmPoolError::RegistryFull);
        }
        if self.pools().any(|(_, r)| r.overlaps(&pool)) {
            return Err(VmPoolError::RegionOverlap);
        }
        let id = RegionId(self.len);
        self.pools[self.len] = Some(pool);
        self.len += 1;
        Ok(id)
    }

    /// Creates a [`VmPool`] over `[base, base + size)` and registers it.
    ///
    /// # Errors
    /// See [`VmPool::new`] and [`PageTableManager::register_region`].
    pub fn create_region(
        &mut self,
        base: VirtualAddress,
        size: u32,
        frame_pool: PoolId,
    ) -> Result<RegionId, VmPoolError> {
        self.register_region(VmPool::new(base, size, frame_pool)?)
    }

    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&VmPool> {
        self.pools.get(id.0).and_then(Option::as_ref)
    }

    pub fn pools(&self) -> impl Iterator<Item = (RegionId, &VmPool)> {
        self.pools[..self.len]
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (RegionId(i), r)))
    }

    /// Reserves `size` bytes in pool `id`.
    ///
    /// The pool's metadata page is backed first so its descriptor table can
    /// be written.
    ///
    /// # Errors
    /// - [`VmPoolError::NotActive`] if this address space is not loaded.
    /// - [`VmPoolError::UnknownPool`] if `id` is unknown.
    /// - [`VmPoolError::OutOfFrames`] if the metadata page cannot be backed.
    /// - Otherwise see [`VmPool::allocate`].
    pub fn allocate<M: Mmu>(
        &mut self,
        paging: &mut Paging<M>,
        id: RegionId,
        size: u32,
    ) -> Result<VirtualAddress, VmPoolError> {
        if !self.is_active(paging) {
            warn!("allocation in region {id:?} of an inactive address space");
            return Err(VmPoolError::NotActive);
        }
        let Some(pool) = self.pools.get_mut(id.0).and_then(Option::as_mut) else {
            return Err(VmPoolError::UnknownPool);
        };

        back_page(paging, pool.base()).map_err(|_| VmPoolError::OutOfFrames)?;
        // SAFETY: The address space is active and the metadata page is mapped.
        unsafe { pool.allocate(paging.mmu_mut(), size) }
    }

    /// Releases the region of pool `id` starting at `start`, unmapping and
    /// freeing every page of it that was backed.
    ///
    /// # Errors
    /// - [`VmPoolError::NotActive`] if this address space is not loaded.
    /// - [`VmPoolError::UnknownPool`] if `id` is unknown.
    /// - [`VmPoolError::InvalidRegion`] if no region starts at `start`.
    pub fn release<M: Mmu>(
        &mut self,
        paging: &mut Paging<M>,
        id: RegionId,
        start: VirtualAddress,
    ) -> Result<(), VmPoolError> {
        if !self.is_active(paging) {
            warn!("release of {start} in an inactive address space");
            return Err(VmPoolError::NotActive);
        }
        let Some(pool) = self.pools.get_mut(id.0).and_then(Option::as_mut) else {
            warn!("release of {start} in unknown region {id:?}");
            return Err(VmPoolError::UnknownPool);
        };

        // SAFETY: The address space is active; a live descriptor implies a
        // mapped metadata page.
        let region = unsafe { pool.release(paging.mmu_mut(), start) }?;
        for i in 0..region.page_count() {
            unmap_page(paging, region.first_page() + i);
        }
        Ok(())
    }

    /// Whether some registered pool vouches for `address`.
    ///
    /// Always `false` while this address space is not loaded.
    #[must_use]
    pub fn is_legitimate<M: Mmu>(&self, paging: &Paging<M>, address: VirtualAddress) -> bool {
        if !self.is_active(paging) {
            return false;
        }
        // SAFETY: The address space is active.
        self.pools()
            .any(|(_, r)| unsafe { r.is_legitimate(paging.mmu(), address) })
    }

    /// Unmaps `page` and returns its frame to the pool that owns it.
    ///
    /// Does nothing if the page was never backed, if it holds a pool's
    /// descriptor table or if this address space is not the active one.
    pub fn free_page<M: Mmu>(&self, paging: &mut Paging<M>, page: PageNumber) {
        if !self.is_active(paging) {
            warn!("free_page({}) on an inactive address space", page.base());
            return;
        }
        if self.pools().any(|(_, r)| r.metadata_page() == page) {
            warn!("free_page({}) would drop a region table", page.base());
            return;
        }
        unmap_page(paging, page);
    }

    /// Resolves a fault at `address` by backing its page with a fresh frame.
    ///
    /// # Errors
    /// - [`FaultError::NotActive`] if this address space is not loaded.
    /// - [`FaultError::ProtectionViolation`] if no registered pool covers
    ///   `address` and it is outside the self-map window.
    /// - [`FaultError::OutOfFrames`] if the process pool is exhausted.
    pub fn handle_fault<M: Mmu>(
        &mut self,
        paging: &mut Paging<M>,
        address: VirtualAddress,
        registers: &Registers,
    ) -> Result<(), FaultError> {
        if !self.is_active(paging) {
            return Err(FaultError::NotActive);
        }

        if !self_map::is_self_mapped(address) && !self.is_legitimate(paging, address) {
            error!(
                "Segmentation Fault: {address} ({})",
                registers.error().explain()
            );
            return Err(FaultError::ProtectionViolation { address });
        }

        if back_page(paging, address).map_err(|_| FaultError::OutOfFrames { address })? {
            debug!("handled page fault at {address}");
        } else {
            debug!("spurious page fault at {address}");
        }
        Ok(())
    }

    /// Translates `address` through this address space.
    #[must_use]
    pub fn query<M: Mmu>(&self, paging: &Paging<M>, address: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.is_active(paging) {
            return None;
        }
        let (dir, table) = split_indices(address);
        // SAFETY: The directory is active.
        let pde = unsafe { read_entry(paging.mmu(), self_map::directory_entry_address(dir)) };
        if !pde.present() {
            return None;
        }
        // SAFETY: The covering table is present.
        let pte = unsafe { read_entry(paging.mmu(), self_map::table_entry_address(dir, table)) };
        pte.present()
            .then_some(pte.physical_address() + address.offset())
    }
}

/// Maps the page containing `address` to a fresh process-pool frame,
/// installing the covering page table first if needed.
///
/// Returns `false` if the page was already present. Callers only pass the
/// active address space.
fn back_page<M: Mmu>(paging: &mut Paging<M>, address: VirtualAddress) -> Result<bool, PagingError> {
    let (dir, table) = split_indices(address);
    let process_pool = paging.process_pool();

    let pde_at = self_map::directory_entry_address(dir);
    // SAFETY: The directory is active; its self-map slot is always present.
    let pde = unsafe { read_entry(paging.mmu(), pde_at) };
    if !pde.present() {
        let frame = paging.allocate_frame(process_pool)?;
        let mmu = paging.mmu_mut();
        // SAFETY: As above; the new table becomes visible at its self-map address.
        unsafe {
            write_entry(mmu, pde_at, PageEntryBits::mapping(frame));
            mmu.flush_tlb();
            fill_placeholders(mmu, self_map::table_base(dir));
        }
        debug!("installed page table {} for slot {}", frame.base(), dir.as_u32());
    }

    let pte_at = self_map::table_entry_address(dir, table);
    // SAFETY: The covering table is present now.
    if unsafe { read_entry(paging.mmu(), pte_at) }.present() {
        return Ok(false);
    }

    let frame = paging.allocate_frame(process_pool)?;
    let mmu = paging.mmu_mut();
    // SAFETY: As above.
    unsafe {
        write_entry(mmu, pte_at, PageEntryBits::mapping(frame));
        mmu.flush_tlb();
        if self_map::is_self_mapped(address) {
            // The new frame is a page table for directory slot `table`.
            fill_placeholders(mmu, address.page().base());
        }
    }
    debug!("backed page {} with frame {}", address.page().base(), frame.base());
    Ok(true)
}

fn unmap_page<M: Mmu>(paging: &mut Paging<M>, page: PageNumber) {
    let dir = DirectoryIndex::of_page(page);
    let table = TableIndex::of_page(page);

    // SAFETY: Callers only pass the active address space.
    let pde = unsafe { read_entry(paging.mmu(), self_map::directory_entry_address(dir)) };
    if !pde.present() {
        return;
    }
    let pte_at = self_map::table_entry_address(dir, table);
    // SAFETY: The covering table is present.
    let mut pte = unsafe { read_entry(paging.mmu(), pte_at) };
    if !pte.present() {
        return;
    }

    let frame = pte.frame();
    paging.frames_mut().release(frame);
    pte.set_present(false);
    let mmu = paging.mmu_mut();
    // SAFETY: As above; the flush drops the stale translation.
    unsafe {
        write_entry(mmu, pte_at, pte);
        mmu.flush_tlb();
    }
    debug!("freed page {} (frame {})", page.base(), frame.base());
}

unsafe fn read_entry<M: Mmu>(mmu: &M, at: VirtualAddress) -> PageEntryBits {
    PageEntryBits::from_bits(unsafe { mmu.read_word(at) })
}

unsafe fn write_entry<M: Mmu>(mmu: &mut M, at: VirtualAddress, entry: PageEntryBits) {
    unsafe { mmu.write_word(at, entry.into_bits()) }
}

/// Writes entry `index` of the table in `frame` through its identity address.
unsafe fn write_physical<M: Mmu>(mmu: &mut M, frame: FrameNumber, index: u32, entry: PageEntryBits) {
    let at = VirtualAddress::identity(frame.base()) + index * ENTRY_SIZE;
    unsafe { write_entry(mmu, at, entry) }
}

unsafe fn fill_placeholders<M: Mmu>(mmu: &mut M, table: VirtualAddress) {
    debug_assert!(table.is_page_aligned());
    for offset in (0..PAGE_SIZE).step_by(ENTRY_SIZE as usize) {
        unsafe { write_entry(mmu, table + offset, PageEntryBits::placeholder()) };
    }
}

//! Host model of an i686 CPU: simulated RAM plus a software page walker
//! implementing [`Mmu`], so the self-map and demand paging run for real.

#![allow(dead_code)]

use kernel_alloc::phys_mapper::PhysMapper;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use kernel_vmem::page_table::split_indices;
use kernel_vmem::{FaultError, MemoryLayout, MemorySystem, Mmu, PageEntryBits, Registers};

/// 32 MiB, enough for the default layout.
pub const RAM_BYTES: usize = 32 * 1024 * 1024;

/// Simulated physical memory starting at physical address 0.
#[derive(Copy, Clone)]
pub struct Ram {
    base: *mut u8,
    len: usize,
}

impl Ram {
    pub fn new(len: usize) -> Self {
        let bytes = vec![0u8; len].leak();
        Self {
            base: bytes.as_mut_ptr(),
            len,
        }
    }

    pub fn read_u32(self, pa: PhysicalAddress) -> u32 {
        assert!(pa.as_usize() + 4 <= self.len, "read beyond RAM at {pa}");
        unsafe { self.base.add(pa.as_usize()).cast::<u32>().read_unaligned() }
    }

    pub fn write_u32(self, pa: PhysicalAddress, value: u32) {
        assert!(pa.as_usize() + 4 <= self.len, "write beyond RAM at {pa}");
        unsafe { self.base.add(pa.as_usize()).cast::<u32>().write_unaligned(value) }
    }

    pub fn entry(self, table: FrameNumber, index: u32) -> PageEntryBits {
        PageEntryBits::from_bits(self.read_u32(table.base() + index * 4))
    }
}

impl PhysMapper for Ram {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        assert!(pa.as_usize() + size_of::<T>() <= self.len);
        unsafe { &mut *self.base.add(pa.as_usize()).cast::<T>() }
    }

    unsafe fn phys_to_slice<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        assert!(pa.as_usize() + len <= self.len);
        unsafe { core::slice::from_raw_parts_mut(self.base.add(pa.as_usize()), len) }
    }
}

pub struct TestMachine {
    ram: Ram,
    cr0: Cr0,
    cr2: Cr2,
    cr3: Cr3,
    /// Number of CR3 writes, each of which drops all cached translations.
    pub flushes: usize,
}

impl TestMachine {
    pub fn new(ram: Ram) -> Self {
        Self {
            ram,
            cr0: Cr0::new().with_pe_protection_enable(true),
            cr2: Cr2::default(),
            cr3: Cr3::new(),
            flushes: 0,
        }
    }

    pub const fn ram(&self) -> Ram {
        self.ram
    }

    /// What the CPU would access for `va`, or `None` if the access faults.
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !self.cr0.pg_paging() {
            return Some(PhysicalAddress::new(va.as_u32()));
        }
        let (dir, table) = split_indices(va);
        let pde = self.ram.entry(self.cr3.directory(), dir.as_u32());
        if !pde.present() {
            return None;
        }
        let pte = self.ram.entry(pde.frame(), table.as_u32());
        pte.present().then(|| pte.physical_address() + va.offset())
    }

    /// Records `va` as the faulting address, as the CPU does before the trap.
    pub fn raise_fault(&mut self, va: VirtualAddress) {
        self.cr2 = Cr2::new(va);
    }
}

impl Mmu for TestMachine {
    fn cr0(&self) -> Cr0 {
        self.cr0
    }

    unsafe fn set_cr0(&mut self, cr0: Cr0) {
        self.cr0 = cr0;
    }

    fn cr2(&self) -> Cr2 {
        self.cr2
    }

    fn cr3(&self) -> Cr3 {
        self.cr3
    }

    unsafe fn set_cr3(&mut self, cr3: Cr3) {
        self.cr3 = cr3;
        self.flushes += 1;
    }

    unsafe fn read_word(&self, at: VirtualAddress) -> u32 {
        match self.translate(at) {
            Some(pa) => self.ram.read_u32(pa),
            None => panic!("memory core faulted reading {at}"),
        }
    }

    unsafe fn write_word(&mut self, at: VirtualAddress, value: u32) {
        match self.translate(at) {
            Some(pa) => self.ram.write_u32(pa, value),
            None => panic!("memory core faulted writing {at}"),
        }
    }
}

/// Boots the memory core with `layout` on a fresh machine.
pub fn boot_with(layout: &MemoryLayout) -> MemorySystem<TestMachine> {
    let ram = Ram::new(RAM_BYTES);
    unsafe { MemorySystem::init(TestMachine::new(ram), &ram, layout) }.expect("boot")
}

pub fn boot() -> MemorySystem<TestMachine> {
    boot_with(&MemoryLayout::default())
}

pub fn fault_registers(write: bool) -> Registers {
    Registers {
        int_no: 14,
        err_code: if write { 0b10 } else { 0 },
        ..Registers::default()
    }
}

/// Performs a CPU access: on a fault the handler runs and the access is retried.
fn resolve(
    system: &mut MemorySystem<TestMachine>,
    va: VirtualAddress,
    write: bool,
) -> Result<PhysicalAddress, FaultError> {
    for _ in 0..2 {
        if let Some(pa) = system.paging().mmu().translate(va) {
            return Ok(pa);
        }
        system.paging_mut().mmu_mut().raise_fault(va);
        system.handle_page_fault(&fault_registers(write))?;
    }
    panic!("fault at {va} was not resolved");
}

pub fn store(
    system: &mut MemorySystem<TestMachine>,
    va: VirtualAddress,
    value: u32,
) -> Result<(), FaultError> {
    let pa = resolve(system, va, true)?;
    system.paging().mmu().ram().write_u32(pa, value);
    Ok(())
}

pub fn load(system: &mut MemorySystem<TestMachine>, va: VirtualAddress) -> Result<u32, FaultError> {
    let pa = resolve(system, va, false)?;
    Ok(system.paging().mmu().ram().read_u32(pa))
}

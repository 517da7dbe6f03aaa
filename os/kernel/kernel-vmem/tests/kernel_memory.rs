mod common;

use common::{boot, fault_registers};
use kernel_info::memory::{HEAP_POOL_BASE, HEAP_POOL_SIZE};
use kernel_memory_addresses::PAGE_SIZE;
use kernel_vmem::{FaultError, KernelMemory};

#[test]
fn faults_before_installation_are_not_handled() {
    let memory = KernelMemory::<common::TestMachine>::new();
    assert!(!memory.is_installed());
    assert_eq!(memory.with(|_| ()), None);
    assert_eq!(
        memory.handle_page_fault(&fault_registers(false)),
        Err(FaultError::NotActive)
    );
}

#[test]
fn only_the_first_installation_wins() {
    let memory = KernelMemory::new();
    assert!(memory.install(boot()));
    assert!(memory.is_installed());
    assert!(!memory.install(boot()));
}

#[test]
fn installed_system_resolves_faults() {
    let memory = KernelMemory::new();
    assert!(memory.install(boot()));

    let start = memory
        .with(|system| {
            let heap = system.create_region(HEAP_POOL_BASE, HEAP_POOL_SIZE)?;
            system.allocate(heap, PAGE_SIZE)
        })
        .expect("installed")
        .expect("allocate");

    memory
        .with(|system| system.paging_mut().mmu_mut().raise_fault(start))
        .expect("installed");
    assert_eq!(memory.handle_page_fault(&fault_registers(true)), Ok(()));

    let mapped = memory
        .with(|system| system.paging().mmu().translate(start))
        .expect("installed");
    assert!(mapped.is_some());
}

#[test]
fn illegitimate_fault_is_reported_through_the_singleton() {
    let memory = KernelMemory::new();
    assert!(memory.install(boot()));
    let address = memory
        .with(|system| {
            let address = HEAP_POOL_BASE + 16 * PAGE_SIZE;
            system.paging_mut().mmu_mut().raise_fault(address);
            address
        })
        .expect("installed");
    assert_eq!(
        memory.handle_page_fault(&fault_registers(false)),
        Err(FaultError::ProtectionViolation { address })
    );
}

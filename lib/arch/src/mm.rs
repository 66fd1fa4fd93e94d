//! Raw paging and TLB operations.
//!
//! The page-table walking and mapping logic lives in the kernel; this module
//! only touches the control registers and the TLB.

use config::mm::PAGE_SIZE;
use x86::controlregs;

/// Loads `pd_phys`, the physical address of a page directory, into CR3.
///
/// # Safety
/// The directory must map the kernel half, or the next instruction fetch
/// faults unrecoverably.
pub unsafe fn switch_page_dir(pd_phys: usize) {
    unsafe { controlregs::cr3_write(pd_phys as u64) };
}

/// Physical address of the live page directory.
pub fn current_page_dir() -> usize {
    unsafe { controlregs::cr3() as usize }
}

/// Invalidates the translation for one page.
pub fn tlb_flush_page(va: usize) {
    unsafe { x86::tlb::flush(va) };
}

/// Invalidates the translations for `npages` pages starting at `va`.
///
/// Required after any operation that removes or narrows the permissions of
/// page-table entries in the range, before user mode is re-entered.
pub fn tlb_flush_range(va: usize, npages: usize) {
    for page in 0..npages {
        unsafe { x86::tlb::flush(va + page * PAGE_SIZE) };
    }
}

/// Invalidates every non-global translation by reloading CR3.
pub fn tlb_flush_all() {
    unsafe { x86::tlb::flush_all() };
}

/// Faulting linear address of the most recent page fault, from CR2.
pub fn fault_address() -> usize {
    unsafe { controlregs::cr2() }
}

//! Page-directory management for 32-bit two-level paging.
//!
//! Every process directory shares the kernel half by copying the boot
//! directory's top-quarter entries (4 MiB kernel pages); the user half is
//! built from 4 KiB mappings installed by the fault handler.

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::collections::BTreeMap;

use arch::pte::{PTE_FRAME_MASK, PteFlags};
use config::mm::{KERNEL_MAP_OFFSET, USER_END_PAGE};
use mm::address::{PhysPageNum, VirtPageNum};
use mm::frame::FrameTracker;
use systype::SysResult;

const ENTRY_COUNT: usize = 1024;
/// First page-directory index of the kernel half.
const KERNEL_PDE_START: usize = KERNEL_MAP_OFFSET >> 22;

static KERNEL_PD_PHYS: AtomicUsize = AtomicUsize::new(0);

/// Remembers the boot page directory as the kernel template. Called once
/// before the first `PageDir::build`.
pub fn record_kernel_page_dir() {
    KERNEL_PD_PHYS.store(arch::mm::current_page_dir(), Ordering::Relaxed);
}

pub fn kernel_page_dir_phys() -> usize {
    KERNEL_PD_PHYS.load(Ordering::Relaxed)
}

fn table_of(frame: &FrameTracker) -> *mut u32 {
    frame.vpn().address().to_usize() as *mut u32
}

/// One process's page directory and the user page tables hanging off it.
pub struct PageDir {
    dir: FrameTracker,
    /// User page-table frames by directory index.
    tables: BTreeMap<usize, FrameTracker>,
}

impl PageDir {
    /// A directory mapping the kernel half and nothing else.
    pub fn build() -> SysResult<Self> {
        let mut dir = FrameTracker::build()?;
        dir.as_mut_slice().fill(0);
        let kernel_dir = (kernel_page_dir_phys() + KERNEL_MAP_OFFSET) as *const u32;
        let new_dir = table_of(&dir);
        for index in KERNEL_PDE_START..ENTRY_COUNT {
            unsafe { *new_dir.add(index) = *kernel_dir.add(index) };
        }
        Ok(Self {
            dir,
            tables: BTreeMap::new(),
        })
    }

    /// Physical address loaded into CR3 / a thread context.
    pub fn phys(&self) -> usize {
        self.dir.ppn().address().to_usize()
    }

    /// Installs a user mapping, replacing any existing entry for `vpn`.
    pub fn map(&mut self, vpn: VirtPageNum, ppn: PhysPageNum, flags: PteFlags) -> SysResult<()> {
        let vpn = vpn.to_usize();
        debug_assert!(vpn < USER_END_PAGE);
        let pde = vpn / ENTRY_COUNT;
        let pte = vpn % ENTRY_COUNT;
        if !self.tables.contains_key(&pde) {
            let mut table = FrameTracker::build()?;
            table.as_mut_slice().fill(0);
            let entry = table.ppn().address().to_usize() as u32
                | (PteFlags::PRESENT | PteFlags::WRITABLE | PteFlags::USER).bits();
            unsafe { *table_of(&self.dir).add(pde) = entry };
            self.tables.insert(pde, table);
        }
        let table = self.tables.get(&pde).expect("just inserted");
        let entry = (ppn.address().to_usize() as u32 & PTE_FRAME_MASK) | flags.bits();
        unsafe { *table_of(table).add(pte) = entry };
        Ok(())
    }

    /// Clears the entries for `npages` pages starting at `start`. Absent
    /// entries stay absent; the caller flushes the TLB.
    pub fn unmap_range(&mut self, start: VirtPageNum, npages: usize) {
        let start = start.to_usize();
        for vpn in start..start + npages {
            let pde = vpn / ENTRY_COUNT;
            let pte = vpn % ENTRY_COUNT;
            if let Some(table) = self.tables.get(&pde) {
                unsafe { *table_of(table).add(pte) = 0 };
            }
        }
    }

    /// Drops every user mapping and page table. Used by fork to force the
    /// parent to refault through its new shadow chain, and by exit.
    pub fn unmap_user(&mut self) {
        let dir = table_of(&self.dir);
        for (&pde, _) in self.tables.iter() {
            unsafe { *dir.add(pde) = 0 };
        }
        self.tables.clear();
    }

    /// The raw entry for `vpn`, if one is installed.
    pub fn lookup(&self, vpn: VirtPageNum) -> Option<u32> {
        let vpn = vpn.to_usize();
        let table = self.tables.get(&(vpn / ENTRY_COUNT))?;
        let entry = unsafe { *table_of(table).add(vpn % ENTRY_COUNT) };
        if PteFlags::from_bits_truncate(entry).contains(PteFlags::PRESENT) {
            Some(entry)
        } else {
            None
        }
    }
}

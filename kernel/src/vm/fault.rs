//! The page-fault handler: from a faulting user address to an installed
//! page-table entry, through the faulted area's memory-object chain.

use alloc::sync::Arc;

use arch::pte::PteFlags;
use config::mm::{PAGE_SIZE, USER_END, USER_START};
use mm::address::{VirtAddr, VirtPageNum};
use systype::{SysError, SysResult};

use crate::proc::Process;
use super::flags::MmapProt;

/// How the faulting instruction touched the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Exec,
}

/// Resolves a user fault at `addr`, or reports why it cannot be: an
/// unmapped address or a protection violation is the caller's cue to
/// deliver SIGSEGV.
pub fn handle_user_fault(proc: &Arc<Process>, addr: usize, access: Access) -> SysResult<()> {
    if !(USER_START..USER_END).contains(&addr) {
        return Err(SysError::EFAULT);
    }
    let pageno = addr / PAGE_SIZE;
    let mut vm = proc.vm();

    let area = vm.map.lookup(pageno).ok_or(SysError::EFAULT)?;
    let needed = match access {
        Access::Read => MmapProt::PROT_READ,
        Access::Write => MmapProt::PROT_WRITE,
        Access::Exec => MmapProt::PROT_EXEC,
    };
    if !area.prot.contains(needed) {
        return Err(SysError::EFAULT);
    }

    let off = pageno - area.start + area.off;
    let obj = Arc::clone(&area.obj);
    let write = access == Access::Write;

    // A write materializes the page in the area's own (for private, top
    // shadow) object; a read settles for the first chain hit, read-only.
    let frame = obj.lookup_page(off, write)?;
    if write {
        // Give the backing store its chance to reserve space before the
        // store retires.
        frame.mark_dirty()?;
    }

    let mut flags = PteFlags::PRESENT | PteFlags::USER;
    if write {
        flags |= PteFlags::WRITABLE;
    }
    frame.pin();
    let mapped = vm
        .pagedir
        .map(VirtPageNum::new(pageno), frame.ppn(), flags);
    frame.unpin();
    mapped?;

    arch::mm::tlb_flush_page(VirtAddr::new(addr).round_down().to_usize());
    log::trace!(
        "[pagefault] {access:?} at {addr:#x} -> obj {} page {off} ({:?})",
        obj.id(),
        frame.ppn()
    );
    Ok(())
}

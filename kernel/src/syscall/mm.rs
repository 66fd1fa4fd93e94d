//! mmap and munmap.

use config::mm::{PAGE_SIZE, USER_END, USER_START, page_aligned};
use config::vfs::FileMode;
use mm::address::VirtPageNum;
use systype::{SysError, SyscallResult};

use crate::processor::current_process;
use crate::vm::flags::{MapDir, MmapFlags, MmapProt};

/// Adds a mapping to the current address space, returning its address.
///
/// # Errors
/// `EINVAL` for misalignment, a hint outside the user window, or a flag
/// word that names neither or both of `MAP_PRIVATE`/`MAP_SHARED`;
/// `EBADF` for a bad descriptor; `EACCES` when the file's open mode is
/// too weak for the requested protection; `ENOMEM` when no hole fits.
pub fn do_mmap(
    addr: usize,
    len: usize,
    prot_raw: u32,
    flags_raw: u32,
    fd: isize,
    off: usize,
) -> SyscallResult {
    let prot = MmapProt::from_bits(prot_raw).ok_or(SysError::EINVAL)?;
    let flags = MmapFlags::from_bits(flags_raw).ok_or(SysError::EINVAL)?;

    if len == 0 || !page_aligned(addr) || !page_aligned(len) || !page_aligned(off) {
        return Err(SysError::EINVAL);
    }
    if addr != 0 && (addr < USER_START || addr.saturating_add(len) > USER_END) {
        return Err(SysError::EINVAL);
    }
    let private = flags.contains(MmapFlags::MAP_PRIVATE);
    let shared = flags.contains(MmapFlags::MAP_SHARED);
    if private == shared {
        return Err(SysError::EINVAL);
    }

    let proc = current_process();
    let vnode = if flags.contains(MmapFlags::MAP_ANON) {
        None
    } else {
        if fd < 0 {
            return Err(SysError::EBADF);
        }
        let file = proc.get_file(fd as usize)?;
        let mode = file.mode();
        if !mode.contains(FileMode::READ) {
            return Err(SysError::EACCES);
        }
        if shared && prot.contains(MmapProt::PROT_WRITE) && !mode.contains(FileMode::WRITE) {
            return Err(SysError::EACCES);
        }
        if prot.contains(MmapProt::PROT_WRITE) && mode == FileMode::APPEND {
            return Err(SysError::EACCES);
        }
        Some(alloc::sync::Arc::clone(file.vnode()))
    };

    let lopage = addr / PAGE_SIZE;
    let npages = len / PAGE_SIZE;
    let mut vm = proc.vm();
    let start = vm
        .map
        .map(vnode, lopage, npages, prot, flags, off / PAGE_SIZE, MapDir::HighToLow)?;
    // Evicted overlaps and stale translations of the installed range.
    vm.pagedir.unmap_range(VirtPageNum::new(start), npages);
    arch::mm::tlb_flush_range(start * PAGE_SIZE, npages);
    Ok(start * PAGE_SIZE)
}

/// Unmaps `[addr, addr + len)`. Unmapped portions of the range are a
/// no-op, so re-running a munmap succeeds.
pub fn do_munmap(addr: usize, len: usize) -> SyscallResult {
    if len == 0 || !page_aligned(addr) || !page_aligned(len) {
        return Err(SysError::EINVAL);
    }
    if addr < USER_START || addr.saturating_add(len) > USER_END {
        return Err(SysError::EINVAL);
    }
    let proc = current_process();
    let lopage = addr / PAGE_SIZE;
    let npages = len / PAGE_SIZE;
    let mut vm = proc.vm();
    vm.map.remove(lopage, npages);
    vm.pagedir.unmap_range(VirtPageNum::new(lopage), npages);
    arch::mm::tlb_flush_range(addr, npages);
    Ok(0)
}

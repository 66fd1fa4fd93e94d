//! Access to user memory from syscall context.
//!
//! The kernel runs on the faulting process's page tables, so user
//! pointers are dereferenced directly; a miss takes the normal page-fault
//! path (CR0.WP is set, so copy-on-write fires for kernel writes too).
//! Only the window check happens up front. Callers must not hold vnode
//! locks across these, or a fault here could invert the lock order
//! against the fault handler.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use config::mm::{USER_END, USER_START};
use config::vfs::PATH_MAX;
use systype::{SysError, SysResult};

fn check_range(addr: usize, len: usize) -> SysResult<()> {
    let end = addr.checked_add(len).ok_or(SysError::EFAULT)?;
    if addr >= USER_START && end <= USER_END {
        Ok(())
    } else {
        Err(SysError::EFAULT)
    }
}

pub fn copy_from_user(addr: usize, len: usize) -> SysResult<Vec<u8>> {
    check_range(addr, len)?;
    let mut buf = vec![0u8; len];
    let src = unsafe { core::slice::from_raw_parts(addr as *const u8, len) };
    buf.copy_from_slice(src);
    Ok(buf)
}

pub fn copy_to_user(addr: usize, data: &[u8]) -> SysResult<()> {
    check_range(addr, data.len())?;
    let dst = unsafe { core::slice::from_raw_parts_mut(addr as *mut u8, data.len()) };
    dst.copy_from_slice(data);
    Ok(())
}

/// Reads a NUL-terminated string, capped at [`PATH_MAX`].
pub fn str_from_user(addr: usize) -> SysResult<String> {
    let mut bytes = Vec::new();
    for off in 0..PATH_MAX + 1 {
        check_range(addr + off, 1)?;
        let byte = unsafe { *((addr + off) as *const u8) };
        if byte == 0 {
            return String::from_utf8(bytes).map_err(|_| SysError::EINVAL);
        }
        bytes.push(byte);
    }
    Err(SysError::ENAMETOOLONG)
}

//! File-system syscalls, argument checks first, the VFS doing the work.

use alloc::sync::Arc;

use config::vfs::{FileMode, O_RDONLY, OpenFlags, SeekFrom};
use systype::{SysError, SysResult, SyscallResult};
use vfs::path::{dir_namev, namev, open_namev};
use vfs::{File, Vnode as _, vput};

use crate::processor::current_process;
use crate::vm::user;

/// Largest single read/write transfer; longer requests are shortened.
const IO_MAX: usize = 128 * 1024;

/// Opens `filename`, returning the new descriptor.
///
/// # Errors
/// `EINVAL` for bad flags, `EMFILE` with a full table, `ENOENT`/`EISDIR`
/// and friends from the path walk, `ENXIO` for a device file without a
/// driver.
pub fn do_open(filename: &str, flags_raw: u32) -> SyscallResult {
    let flags = OpenFlags::from_bits(flags_raw).ok_or(SysError::EINVAL)?;
    let mode = match flags.access_mode() {
        O_RDONLY => FileMode::READ,
        bits if bits == OpenFlags::O_WRONLY.bits() => FileMode::WRITE,
        bits if bits == OpenFlags::O_RDWR.bits() => FileMode::READ | FileMode::WRITE,
        _ => return Err(SysError::EINVAL),
    };
    let mode = if flags.contains(OpenFlags::O_APPEND) {
        mode | FileMode::APPEND
    } else {
        mode
    };

    let proc = current_process();
    let vnode = open_namev(filename, flags, Some(proc.cwd()?))?;

    // A device entry is only openable if its driver is around.
    match vnode.vtype() {
        config::inode::VnodeType::CharDev => {
            if driver::lookup_char_device(vnode.devid()).is_none() {
                vput(vnode);
                return Err(SysError::ENXIO);
            }
        }
        config::inode::VnodeType::BlockDev => {
            if driver::lookup_block_device(vnode.devid()).is_none() {
                vput(vnode);
                return Err(SysError::ENXIO);
            }
        }
        _ => {}
    }

    let file = File::new(vnode, mode);
    proc.alloc_fd(file)
}

pub fn do_close(fd: usize) -> SyscallResult {
    current_process().close_fd(fd)?;
    Ok(0)
}

pub fn do_dup(fd: usize) -> SyscallResult {
    let proc = current_process();
    let file = proc.get_file(fd)?;
    proc.alloc_fd(file)
}

pub fn do_lseek(fd: usize, offset: isize, whence: usize) -> SyscallResult {
    let file = current_process().get_file(fd)?;
    let from = match whence {
        0 => SeekFrom::Start(offset as usize),
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return Err(SysError::EINVAL),
    };
    file.seek(from)
}

pub fn do_mkdir(path: &str) -> SyscallResult {
    let proc = current_process();
    let (parent, name) = dir_namev(path, Some(proc.cwd()?))?;
    if name.is_empty() {
        return Err(SysError::EEXIST);
    }
    parent.mkdir(&name)?;
    vput(parent);
    Ok(0)
}

pub fn do_rmdir(path: &str) -> SyscallResult {
    let proc = current_process();
    let (parent, name) = dir_namev(path, Some(proc.cwd()?))?;
    if name.is_empty() {
        return Err(SysError::EINVAL);
    }
    parent.rmdir(&name)?;
    vput(parent);
    Ok(0)
}

pub fn do_unlink(path: &str) -> SyscallResult {
    let proc = current_process();
    let (parent, name) = dir_namev(path, Some(proc.cwd()?))?;
    if name.is_empty() {
        return Err(SysError::EINVAL);
    }
    parent.unlink(&name)?;
    vput(parent);
    Ok(0)
}

/// Makes `new_path` a hard link to `old_path`.
pub fn do_link(old_path: &str, new_path: &str) -> SyscallResult {
    let proc = current_process();
    let cwd = proc.cwd()?;
    let target = namev(old_path, Some(Arc::clone(&cwd)))?;
    let (parent, name) = dir_namev(new_path, Some(cwd))?;
    if name.is_empty() {
        vput(target);
        vput(parent);
        return Err(SysError::EEXIST);
    }
    let linked = parent.link(&target, &name);
    vput(target);
    vput(parent);
    linked?;
    Ok(0)
}

pub fn do_stat(path: &str) -> SysResult<vfs::Stat> {
    let proc = current_process();
    let vnode = namev(path, Some(proc.cwd()?))?;
    let stat = vnode.stat();
    vput(vnode);
    stat
}

/// Dirent layout handed to user space by `sys_readdir`.
#[repr(C)]
pub struct UserDirent {
    pub ino: u32,
    pub vtype: u32,
    /// NUL-terminated name.
    pub name: [u8; config::vfs::NAME_MAX + 1],
}

/// Reads the next entry of an open directory. Returns `None` at the end.
pub fn do_readdir(fd: usize) -> SysResult<Option<vfs::DirEntry>> {
    current_process().get_file(fd)?.readdir()
}

// Register-level entry points: user pointers in, bounce buffers between.
// Transfers go through kernel memory so no vnode lock is ever held while
// touching (and possibly faulting on) user pages.

pub fn sys_read(fd: usize, buf: usize, len: usize) -> SyscallResult {
    let file = current_process().get_file(fd)?;
    let len = len.min(IO_MAX);
    let mut bounce = alloc::vec![0u8; len];
    let count = file.read(&mut bounce)?;
    user::copy_to_user(buf, &bounce[..count])?;
    Ok(count)
}

pub fn sys_write(fd: usize, buf: usize, len: usize) -> SyscallResult {
    let file = current_process().get_file(fd)?;
    let len = len.min(IO_MAX);
    let bounce = user::copy_from_user(buf, len)?;
    file.write(&bounce)
}

pub fn sys_link(old_path: usize, new_path: usize) -> SyscallResult {
    let old_path = user::str_from_user(old_path)?;
    let new_path = user::str_from_user(new_path)?;
    do_link(&old_path, &new_path)
}

/// Returns 1 with an entry written to `out`, or 0 at the end of the
/// directory.
pub fn sys_readdir(fd: usize, out: usize) -> SyscallResult {
    let Some(entry) = do_readdir(fd)? else {
        return Ok(0);
    };
    let mut dirent = UserDirent {
        ino: entry.ino,
        vtype: entry.vtype as u32,
        name: [0; config::vfs::NAME_MAX + 1],
    };
    let name = entry.name.as_bytes();
    dirent.name[..name.len()].copy_from_slice(name);
    let bytes = unsafe {
        core::slice::from_raw_parts(
            &dirent as *const UserDirent as *const u8,
            core::mem::size_of::<UserDirent>(),
        )
    };
    user::copy_to_user(out, bytes)?;
    Ok(1)
}

pub fn sys_stat(path: usize, out: usize) -> SyscallResult {
    let path = user::str_from_user(path)?;
    let stat = do_stat(&path)?;
    let bytes = unsafe {
        core::slice::from_raw_parts(
            &stat as *const vfs::Stat as *const u8,
            core::mem::size_of::<vfs::Stat>(),
        )
    };
    user::copy_to_user(out, bytes)?;
    Ok(0)
}

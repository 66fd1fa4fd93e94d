//! Syscall numbers and the register-level dispatcher.
//!
//! Arguments arrive in ebx, ecx, edx, esi, edi (and ebp for the sixth),
//! the number in eax; the result or negated errno goes back in eax.

pub mod fs;
pub mod mm;
pub mod proc;

use arch::trap::Regs;
use systype::SyscallResult;

use crate::vm::user;

pub const SYS_EXIT: u32 = 1;
pub const SYS_FORK: u32 = 2;
pub const SYS_READ: u32 = 3;
pub const SYS_WRITE: u32 = 4;
pub const SYS_OPEN: u32 = 5;
pub const SYS_CLOSE: u32 = 6;
pub const SYS_WAITPID: u32 = 7;
pub const SYS_LINK: u32 = 8;
pub const SYS_UNLINK: u32 = 9;
pub const SYS_MKDIR: u32 = 10;
pub const SYS_RMDIR: u32 = 11;
pub const SYS_LSEEK: u32 = 12;
pub const SYS_DUP: u32 = 13;
pub const SYS_STAT: u32 = 14;
pub const SYS_MMAP: u32 = 15;
pub const SYS_MUNMAP: u32 = 16;
pub const SYS_READDIR: u32 = 17;

pub fn dispatch(regs: &mut Regs) {
    let (a1, a2, a3, a4, a5, a6) = (
        regs.ebx as usize,
        regs.ecx as usize,
        regs.edx as usize,
        regs.esi as usize,
        regs.edi as usize,
        regs.ebp as usize,
    );
    let result: SyscallResult = match regs.eax {
        SYS_EXIT => crate::proc::exit_current(a1 as i32),
        SYS_FORK => crate::proc::do_fork(regs),
        SYS_READ => fs::sys_read(a1, a2, a3),
        SYS_WRITE => fs::sys_write(a1, a2, a3),
        SYS_OPEN => user::str_from_user(a1).and_then(|path| fs::do_open(&path, a2 as u32)),
        SYS_CLOSE => fs::do_close(a1),
        SYS_WAITPID => proc::sys_waitpid(a1 as isize, a2),
        SYS_LINK => fs::sys_link(a1, a2),
        SYS_UNLINK => user::str_from_user(a1).and_then(|path| fs::do_unlink(&path)),
        SYS_MKDIR => user::str_from_user(a1).and_then(|path| fs::do_mkdir(&path)),
        SYS_RMDIR => user::str_from_user(a1).and_then(|path| fs::do_rmdir(&path)),
        SYS_LSEEK => fs::do_lseek(a1, a2 as isize, a3),
        SYS_DUP => fs::do_dup(a1),
        SYS_STAT => fs::sys_stat(a1, a2),
        SYS_MMAP => mm::do_mmap(a1, a2, a3 as u32, a4 as u32, a5 as isize, a6),
        SYS_MUNMAP => mm::do_munmap(a1, a2),
        SYS_READDIR => fs::sys_readdir(a1, a2),
        other => {
            log::warn!("[syscall] unknown number {other}");
            Err(systype::SysError::EINVAL)
        }
    };
    regs.eax = match result {
        Ok(value) => value as u32,
        Err(err) => -err.code() as u32,
    };
}

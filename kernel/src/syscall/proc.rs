//! Process syscalls other than fork/exit, which live with the process
//! code itself.

use systype::SyscallResult;

use crate::processor::current_process;
use crate::vm::user;

pub fn sys_waitpid(pid: isize, status_out: usize) -> SyscallResult {
    let (pid, status) = current_process().waitpid(pid)?;
    if status_out != 0 {
        user::copy_to_user(status_out, &status.to_ne_bytes())?;
    }
    Ok(pid)
}

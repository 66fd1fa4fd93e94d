//! fork: duplicate the current process.
//!
//! The address space is cloned with a fresh shadow object interposed over
//! every private area in both parent and child; open files and the
//! working directory are shared by reference; the calling thread is
//! cloned so the child's first schedule returns 0 from the syscall in
//! user mode.

use alloc::sync::Arc;

use arch::trap::Regs;
use systype::SyscallResult;

use crate::processor::current_process;
use crate::sched;
use crate::vm;

use super::{PROC_TABLE, Process};

pub fn do_fork(regs: &Regs) -> SyscallResult {
    let parent = current_process();

    // Split the address space. Holding the parent's vm lock across the
    // whole split keeps its threads from faulting pages through the old
    // chains mid-interposition.
    let child_vm = {
        let mut parent_vm = parent.vm();
        vm::fork_vmspace(&mut parent_vm)?
    };

    let child = Process::build(&parent.name(), child_vm);
    *child.files.lock() = parent.dup_files();
    if let Some(cwd) = parent.cwd.lock().clone() {
        child.set_cwd(cwd);
    }
    parent.add_child(&child);

    // The child thread's first schedule lands in the trap-return path
    // with this register frame: it enters user mode where the parent
    // trapped, with eax zeroed so fork returns 0 there.
    let pd_phys = child.vm().pagedir.phys();
    let thread = match sched::KThread::fork_user(regs, pd_phys) {
        Ok(thread) => thread,
        Err(err) => {
            // Undo the visible half of the fork; the child's address
            // space and file references die with its Arc.
            parent.children.lock().retain(|c| c.pid() != child.pid());
            return Err(err);
        }
    };
    child.adopt_thread(&thread);

    PROC_TABLE.lock().insert(child.pid(), Arc::clone(&child));
    sched::register(&thread);
    sched::make_runnable(thread);

    log::info!("[fork] pid {} -> pid {}", parent.pid(), child.pid());
    Ok(child.pid())
}

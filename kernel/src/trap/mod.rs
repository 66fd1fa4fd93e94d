//! The kernel's trap dispatcher, registered with the arch layer at boot.
//!
//! Runs with interrupts disabled on the trapping thread's kernel stack.
//! Anything that can block (fault resolution, syscalls) is fine here:
//! this is thread context, not interrupt-handler context.

use arch::trap::{Regs, T_GP_FAULT, T_PAGE_FAULT, T_SYSCALL};
use config::mm::{USER_END, USER_START};

use crate::proc::{self, SIGSEGV_STATUS};
use crate::processor::try_current_process;
use crate::syscall;
use crate::vm::fault::{Access, handle_user_fault};

pub fn dispatch(regs: &mut Regs) {
    match regs.intr as u8 {
        T_SYSCALL => syscall::dispatch(regs),
        T_PAGE_FAULT => page_fault(regs),
        T_GP_FAULT if regs.from_user() => {
            log::warn!(
                "[trap] general protection fault in user mode at {:#x}",
                regs.eip
            );
            proc::exit_current(SIGSEGV_STATUS);
        }
        vector => panic!(
            "unhandled trap {} (err {:#x}) at {:#x}",
            vector, regs.err, regs.eip
        ),
    }
}

fn page_fault(regs: &mut Regs) {
    let addr = arch::mm::fault_address();
    let access = if regs.err & 0x2 != 0 {
        Access::Write
    } else if regs.eip as usize == addr {
        // Jump into the page that faulted: an instruction fetch.
        Access::Exec
    } else {
        Access::Read
    };

    // Faults on user addresses resolve through the address-space map,
    // whether they came from user mode or from the kernel touching a
    // user buffer on the process's behalf.
    if (USER_START..USER_END).contains(&addr) {
        if let Some(proc) = try_current_process() {
            match handle_user_fault(&proc, addr, access) {
                Ok(()) => return,
                Err(err) => {
                    if regs.from_user() {
                        log::warn!(
                            "[trap] segfault: pid {} {:?} at {:#x} ({:?})",
                            proc.pid(),
                            access,
                            addr,
                            err
                        );
                        proc::exit_current(SIGSEGV_STATUS);
                    }
                }
            }
        }
    }
    panic!(
        "kernel page fault: {:?} at {:#x}, eip {:#x}, err {:#x}",
        access, addr, regs.eip, regs.err
    );
}

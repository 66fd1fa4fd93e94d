//! End-to-end fork test.
//!
//! The child built here "returns" to a user eip with nothing mapped, so
//! its first instruction fetch faults, the fault handler finds no area,
//! and the child is killed as a segfault. That drives the whole path:
//! address-space split, thread clone, first schedule through the
//! trap-return frame, user-mode entry, fault delivery, exit, and the
//! parent's waitpid.

use arch::gdt::{USER_CS, USER_DS};
use arch::trap::Regs;
use config::mm::{PAGE_SIZE, USER_START};

use crate::proc::{self, SIGSEGV_STATUS};
use crate::processor::current_process;
use crate::syscall::mm::{do_mmap, do_munmap};
use crate::vm::flags::{MmapFlags, MmapProt};

fn user_regs(eip: usize, esp: usize) -> Regs {
    Regs {
        edi: 0,
        esi: 0,
        ebp: 0,
        esp_dummy: 0,
        ebx: 0,
        edx: 0,
        ecx: 0,
        eax: 0,
        es: USER_DS as u32,
        ds: USER_DS as u32,
        intr: 0,
        err: 0,
        eip: eip as u32,
        cs: USER_CS as u32,
        eflags: 0x202,
        useresp: esp as u32,
        ss: USER_DS.bits() as u32,
    }
}

pub fn fork_test() {
    let parent = current_process();

    // Give the parent a private page with known content; the fork path
    // must interpose shadows over it on both sides.
    let addr = do_mmap(
        0,
        PAGE_SIZE,
        (MmapProt::PROT_READ | MmapProt::PROT_WRITE).bits(),
        (MmapFlags::MAP_PRIVATE | MmapFlags::MAP_ANON).bits(),
        -1,
        0,
    )
    .unwrap();
    unsafe { *(addr as *mut u8) = b'P' };

    let regs = user_regs(USER_START, addr + PAGE_SIZE);
    let child_pid = proc::do_fork(&regs).unwrap();
    assert_ne!(child_pid, parent.pid());

    // The child dies of its fetch fault; reap it.
    let (reaped, status) = parent.waitpid(child_pid as isize).unwrap();
    assert_eq!(reaped, child_pid);
    assert_eq!(status, SIGSEGV_STATUS);

    // The parent's page survived the split and the scrub: this read
    // refaults through the interposed shadow chain.
    unsafe { assert_eq!(*(addr as *const u8), b'P') };

    // No children left.
    assert!(parent.waitpid(-1).is_err());

    do_munmap(addr, PAGE_SIZE).unwrap();
    log::info!("[ktest] fork_test pass");
}

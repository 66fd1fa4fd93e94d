//! Scheduler and sleep-lock tests: a second kernel thread contends with
//! the init thread over a sleep lock and the file system.

use core::sync::atomic::{AtomicBool, Ordering};

use mutex::SleepMutex;
use vfs::Vnode as _;

use crate::processor::current_process;
use crate::sched::{spawn_kernel, yield_now};
use crate::syscall::fs::{do_close, do_open, do_unlink};

static COUNTER: SleepMutex<usize> = SleepMutex::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

extern "C" fn worker(rounds: usize) {
    for _ in 0..rounds {
        let mut counter = COUNTER.lock();
        *counter += 1;
        // Yield with the lock held, so the other side piles up on it.
        yield_now();
    }
    DONE.store(true, Ordering::Release);
}

pub fn sleep_lock_test() {
    const ROUNDS: usize = 64;
    spawn_kernel(worker, ROUNDS).unwrap();

    let mut own = 0;
    while !DONE.load(Ordering::Acquire) {
        let mut counter = COUNTER.lock();
        *counter += 1;
        own += 1;
        drop(counter);
        yield_now();
    }
    assert_eq!(*COUNTER.lock(), ROUNDS + own);

    log::info!("[ktest] sleep_lock_test pass");
}

static FILE_DONE: AtomicBool = AtomicBool::new(false);

extern "C" fn file_worker(_arg: usize) {
    // The worker has no process; write through the vnode layer directly.
    let root = vfs::mount::root_vnode().unwrap();
    let file = root.lookup("ktest_interleave").unwrap();
    for i in 0..16u8 {
        file.write_at(i as usize, &[i]).unwrap();
        yield_now();
    }
    vfs::vput(file);
    vfs::vput(root);
    FILE_DONE.store(true, Ordering::Release);
}

/// Two threads interleave on one file; the vnode lock keeps every write
/// intact.
pub fn file_interleave_test() {
    let fd = do_open(
        "/ktest_interleave",
        (config::vfs::OpenFlags::O_CREAT | config::vfs::OpenFlags::O_RDWR).bits(),
    )
    .unwrap();
    let file = current_process().get_file(fd).unwrap();
    file.write(&[0xee; 32]).unwrap();

    spawn_kernel(file_worker, 0).unwrap();
    while !FILE_DONE.load(Ordering::Acquire) {
        file.vnode().write_at(16, &[0xaa; 16]).unwrap();
        yield_now();
    }

    let mut buf = [0u8; 32];
    file.vnode().read_at(0, &mut buf).unwrap();
    for (i, &byte) in buf[..16].iter().enumerate() {
        assert_eq!(byte, i as u8);
    }
    assert!(buf[16..].iter().all(|&b| b == 0xaa));

    do_close(fd).unwrap();
    do_unlink("/ktest_interleave").unwrap();
    log::info!("[ktest] file_interleave_test pass");
}

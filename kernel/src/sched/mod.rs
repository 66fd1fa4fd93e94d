//! The cooperative scheduler.
//!
//! Kernel threads run until they block or yield; the run queue is plain
//! FIFO. Blocking is built on park/unpark with a one-shot permit, which
//! the `mutex` crate's sleep lock and wait queue consume through the
//! [`mutex::SchedIf`] interface implemented here.

mod kthread;

pub use kthread::{KThread, spawn_kernel};

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use mutex::SpinNoIrqLock;

use crate::processor::{current_thread, set_current};
use kthread::ThreadState;

static RUN_QUEUE: SpinNoIrqLock<VecDeque<Arc<KThread>>> = SpinNoIrqLock::new(VecDeque::new());

/// Every live thread, for `unpark` by id.
static THREADS: SpinNoIrqLock<BTreeMap<usize, Weak<KThread>>> = SpinNoIrqLock::new(BTreeMap::new());

/// Threads that exited but whose stacks are still hot: freed by the next
/// thread to come off a context switch.
static FINISHED: SpinNoIrqLock<Vec<Arc<KThread>>> = SpinNoIrqLock::new(Vec::new());

/// Adopts the boot flow of control as thread 0 and installs it as current.
pub fn init() {
    let boot = KThread::adopt_boot();
    THREADS.lock().insert(boot.tid(), Arc::downgrade(&boot));
    set_current(boot);
    log::info!("[sched] boot thread adopted");
}

/// Moves the running thread onto another page directory, keeping its
/// saved context in agreement so a later switch-in reloads the same one.
pub fn set_current_page_dir(pd_phys: usize) {
    let current = current_thread();
    unsafe {
        (*current.context_ptr()).pd = pd_phys;
        arch::mm::switch_page_dir(pd_phys);
    }
}

pub(crate) fn register(thread: &Arc<KThread>) {
    THREADS.lock().insert(thread.tid(), Arc::downgrade(thread));
}

/// Puts a thread on the run queue.
pub fn make_runnable(thread: Arc<KThread>) {
    thread.set_state(ThreadState::Runnable);
    RUN_QUEUE.lock().push_back(thread);
}

/// Gives up the CPU, keeping the caller runnable.
pub fn yield_now() {
    let current = current_thread();
    make_runnable(Arc::clone(&current));
    switch_from(current);
}

/// Blocks the caller until its permit arrives. Returns immediately when
/// the permit is already pending.
pub fn park() {
    let current = current_thread();
    if current.take_permit() {
        return;
    }
    current.set_state(ThreadState::Parked);
    // The permit may have landed between the check and the state change.
    if current.take_permit() {
        current.set_state(ThreadState::Running);
        return;
    }
    switch_from(current);
}

/// Grants `tid` its permit, waking it if parked.
pub fn unpark(tid: usize) {
    let thread = THREADS.lock().get(&tid).and_then(Weak::upgrade);
    if let Some(thread) = thread {
        thread.give_permit();
        if thread.state() == ThreadState::Parked {
            make_runnable(thread);
        }
    }
}

/// Terminates the calling thread. The stack stays live until another
/// thread reaps it after the switch.
pub fn exit_current() -> ! {
    let current = current_thread();
    THREADS.lock().remove(&current.tid());
    current.set_state(ThreadState::Exited);
    FINISHED.lock().push(Arc::clone(&current));
    switch_from(current);
    unreachable!("exited thread rescheduled");
}

/// Hands the CPU to the next runnable thread. Returns when `current` is
/// scheduled again (never, for an exited thread).
fn switch_from(current: Arc<KThread>) {
    loop {
        let next = RUN_QUEUE.lock().pop_front();
        let Some(next) = next else {
            if current.state() == ThreadState::Runnable || current.state() == ThreadState::Running {
                // Nothing else to do; keep running.
                current.set_state(ThreadState::Running);
                return;
            }
            panic!("scheduler: no runnable thread and current is blocked");
        };
        if next.tid() == current.tid() {
            next.set_state(ThreadState::Running);
            return;
        }
        if next.state() == ThreadState::Exited {
            continue;
        }
        next.set_state(ThreadState::Running);
        arch::gdt::set_kernel_stack(next.kstack_top());
        let next_ctx = next.context_ptr();
        let cur_ctx = current.context_ptr();
        set_current(next);
        unsafe {
            arch::context::ctx_switch(&mut *cur_ctx, &*next_ctx);
        }
        // Running again; some other thread switched back to us.
        reap_finished();
        return;
    }
}

/// Frees stacks of threads that exited since the last switch. Never runs
/// on the exiting thread's own stack.
fn reap_finished() {
    let finished = core::mem::take(&mut *FINISHED.lock());
    drop(finished);
}

struct SchedIfImpl;

#[crate_interface::impl_interface]
impl mutex::SchedIf for SchedIfImpl {
    fn current_tid() -> usize {
        current_thread().tid()
    }

    fn park() {
        park();
    }

    fn unpark(tid: usize) {
        unpark(tid);
    }
}

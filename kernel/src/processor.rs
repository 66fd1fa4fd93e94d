//! The per-CPU current-task pointers. One CPU, so one instance, but all
//! access funnels through accessors so nothing else grows a dependency on
//! that fact.

use core::cell::SyncUnsafeCell;

use alloc::sync::Arc;

use crate::proc::Process;
use crate::sched::KThread;

struct Processor {
    current: Option<Arc<KThread>>,
}

static PROCESSOR: SyncUnsafeCell<Processor> = SyncUnsafeCell::new(Processor { current: None });

/// The running thread. Valid from `sched::init` on.
pub fn current_thread() -> Arc<KThread> {
    unsafe { (*PROCESSOR.get()).current.clone() }.expect("no current thread")
}

/// The running thread's process, if it belongs to one. Boot-time kernel
/// threads have none until `proc::init` adopts them.
pub fn try_current_process() -> Option<Arc<Process>> {
    unsafe { (*PROCESSOR.get()).current.as_ref() }?.process()
}

pub fn current_process() -> Arc<Process> {
    try_current_process().expect("current thread has no process")
}

/// Installs `thread` as current. Called by the scheduler with interrupts
/// disabled, right before the context switch.
pub(crate) fn set_current(thread: Arc<KThread>) {
    unsafe { (*PROCESSOR.get()).current = Some(thread) };
}

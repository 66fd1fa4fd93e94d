#![no_std]
#![feature(negative_impls)]

extern crate alloc;

mod sleep_mutex;
mod spin_mutex;
mod wait_queue;

pub use sleep_mutex::{SleepMutex, SleepMutexGuard};
pub use spin_mutex::SpinMutex;
pub use wait_queue::WaitQueue;

use x86::bits32::eflags::{self, EFlags};

pub type SpinLock<T> = SpinMutex<T, Spin>;
pub type SpinNoIrqLock<T> = SpinMutex<T, SpinNoIrq>;

/// Low-level support for a spin lock: what to do around the critical section.
pub trait MutexSupport {
    /// Guard data
    type GuardData;
    /// Called before lock() & try_lock()
    fn before_lock() -> Self::GuardData;
    /// Called when the guard drops
    fn after_unlock(_: &mut Self::GuardData);
}

/// Plain spinning, interrupts left as they are.
#[derive(Debug)]
pub struct Spin;

impl MutexSupport for Spin {
    type GuardData = ();
    #[inline(always)]
    fn before_lock() -> Self::GuardData {}
    #[inline(always)]
    fn after_unlock(_: &mut Self::GuardData) {}
}

/// Saves the interrupt-enable flag and disables interrupts for the duration
/// of the critical section; restores the saved state on unlock.
pub struct IrqGuard(bool);

impl IrqGuard {
    fn new() -> Self {
        let enabled = unsafe { eflags::read() }.contains(EFlags::FLAGS_IF);
        unsafe { x86::irq::disable() };
        Self(enabled)
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.0 {
            unsafe { x86::irq::enable() };
        }
    }
}

/// Spinning with interrupts disabled. The only support suitable for data
/// shared with interrupt handlers.
#[derive(Debug)]
pub struct SpinNoIrq;

impl MutexSupport for SpinNoIrq {
    type GuardData = IrqGuard;
    #[inline(always)]
    fn before_lock() -> Self::GuardData {
        IrqGuard::new()
    }
    #[inline(always)]
    fn after_unlock(_: &mut Self::GuardData) {}
}

/// Scheduler operations the blocking primitives in this crate are built on.
///
/// The kernel implements this with `#[crate_interface::impl_interface]`; the
/// scheduler itself stays out of this crate. `unpark` grants a one-shot
/// permit: if it arrives before the target thread parks, the next `park`
/// returns immediately.
#[crate_interface::def_interface]
pub trait SchedIf: Send + Sync {
    /// Id of the running thread.
    fn current_tid() -> usize;
    /// Deschedule the current thread until its permit is granted.
    fn park();
    /// Grant `tid` its permit, making it runnable if it is parked.
    fn unpark(tid: usize);
}

#[inline]
pub(crate) fn current_tid() -> usize {
    crate_interface::call_interface!(SchedIf::current_tid())
}

#[inline]
pub(crate) fn park() {
    crate_interface::call_interface!(SchedIf::park())
}

#[inline]
pub(crate) fn unpark(tid: usize) {
    crate_interface::call_interface!(SchedIf::unpark(tid))
}

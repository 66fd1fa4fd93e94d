use alloc::collections::VecDeque;
use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
};

use crate::{SpinNoIrqLock, current_tid, park, unpark};

/// A blocking mutex. A thread that finds the lock held is descheduled until
/// the holder unlocks; the holder hands the lock to the longest waiter.
///
/// Acquiring is a suspension point. Never take one from an interrupt
/// handler, and never while holding a spin lock.
pub struct SleepMutex<T: ?Sized> {
    inner: SpinNoIrqLock<Inner>,
    data: UnsafeCell<T>,
}

struct Inner {
    owner: Option<usize>,
    waiters: VecDeque<usize>,
}

pub struct SleepMutexGuard<'a, T: ?Sized> {
    mutex: &'a SleepMutex<T>,
}

impl<T: ?Sized> !Send for SleepMutexGuard<'_, T> {}

unsafe impl<T: ?Sized + Send> Sync for SleepMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for SleepMutex<T> {}

impl<T> SleepMutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: SpinNoIrqLock::new(Inner {
                owner: None,
                waiters: VecDeque::new(),
            }),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> SleepMutex<T> {
    pub fn lock(&self) -> SleepMutexGuard<'_, T> {
        let tid = current_tid();
        loop {
            {
                let mut inner = self.inner.lock();
                match inner.owner {
                    None => {
                        inner.owner = Some(tid);
                        return SleepMutexGuard { mutex: self };
                    }
                    Some(owner) => {
                        assert_ne!(owner, tid, "sleep mutex: relock by holder");
                        if !inner.waiters.contains(&tid) {
                            inner.waiters.push_back(tid);
                        }
                    }
                }
            }
            // The holder may unlock between the drop above and this park;
            // the unpark permit makes that window harmless.
            park();
        }
    }

    /// Whether the calling thread holds the lock. Used in assertions by
    /// layers that require their caller to have locked.
    pub fn held_by_current(&self) -> bool {
        self.inner.lock().owner == Some(current_tid())
    }
}

impl<T: ?Sized> Deref for SleepMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SleepMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for SleepMutexGuard<'_, T> {
    fn drop(&mut self) {
        let next = {
            let mut inner = self.mutex.inner.lock();
            inner.owner = None;
            inner.waiters.pop_front()
        };
        if let Some(next) = next {
            unpark(next);
        }
    }
}

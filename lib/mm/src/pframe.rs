//! Page frames, the currency of the page cache.
//!
//! A [`PageFrame`] is one resident physical page, keyed by its owning
//! memory object and page number within that object. At most one frame
//! exists per key; the per-object residence table in
//! [`MemObjMeta`](crate::mmobj::MemObjMeta) enforces this. A frame being
//! filled carries the busy flag; a second thread asking for the same key
//! sleeps on the frame's wait queue rather than starting a second fill.

use core::cell::SyncUnsafeCell;

use alloc::sync::{Arc, Weak};

use config::mm::PAGE_SIZE;
use mutex::{SpinNoIrqLock, WaitQueue};
use systype::{SysError, SysResult};

use crate::address::PhysPageNum;
use crate::frame::FrameTracker;
use crate::mmobj::MemObject;

pub struct PageFrame {
    /// Owning object; half of the cache key.
    obj: Weak<dyn MemObject>,
    /// Page number within the object; the other half of the key.
    pageno: usize,
    frame: SyncUnsafeCell<FrameTracker>,
    state: SpinNoIrqLock<FrameState>,
    waiters: WaitQueue,
}

#[derive(Debug, Clone, Copy)]
struct FrameState {
    pincount: usize,
    dirty: bool,
    busy: bool,
}

impl PageFrame {
    /// Allocates a frame for (`obj`, `pageno`), born busy. The creator
    /// fills it and calls [`Self::fill_done`].
    pub(crate) fn build(obj: &Arc<dyn MemObject>, pageno: usize) -> SysResult<Self> {
        Ok(Self {
            obj: Arc::downgrade(obj),
            pageno,
            frame: SyncUnsafeCell::new(FrameTracker::build()?),
            state: SpinNoIrqLock::new(FrameState {
                pincount: 0,
                dirty: false,
                busy: true,
            }),
            waiters: WaitQueue::new(),
        })
    }

    pub fn pageno(&self) -> usize {
        self.pageno
    }

    pub fn object(&self) -> Option<Arc<dyn MemObject>> {
        self.obj.upgrade()
    }

    pub fn ppn(&self) -> PhysPageNum {
        unsafe { (*self.frame.get()).ppn() }
    }

    /// Kernel-virtual address of the frame's data.
    pub fn kernel_addr(&self) -> usize {
        self.ppn().to_vpn_kernel().address().to_usize()
    }

    pub fn as_slice(&self) -> &[u8; PAGE_SIZE] {
        unsafe { (*self.frame.get()).as_slice() }
    }

    /// Mutable view of the frame's bytes.
    ///
    /// No synchronization is provided here; writers hold the pin and the
    /// locks of the layer they belong to (vnode lock, address-space lock).
    #[allow(clippy::mut_from_ref)]
    pub fn as_mut_slice(&self) -> &mut [u8; PAGE_SIZE] {
        unsafe { (*self.frame.get()).as_mut_slice() }
    }

    pub fn copy_from_frame(&self, other: &PageFrame) {
        self.as_mut_slice().copy_from_slice(other.as_slice());
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn pincount(&self) -> usize {
        self.state.lock().pincount
    }

    /// Sleeps until the frame is no longer busy.
    pub fn wait_not_busy(&self) {
        while self.is_busy() {
            self.waiters.sleep();
        }
    }

    pub(crate) fn fill_done(&self) {
        self.state.lock().busy = false;
        self.waiters.wake_all();
    }

    /// Raises the pin count, keeping the frame ineligible for eviction and
    /// write-back until the matching [`Self::unpin`]. Pins stack.
    pub fn pin(&self) {
        self.state.lock().pincount += 1;
    }

    pub fn unpin(&self) {
        let mut state = self.state.lock();
        assert!(state.pincount > 0, "unpin of unpinned frame");
        state.pincount -= 1;
    }

    /// Marks the frame dirty, first giving the backing store its chance to
    /// reserve space (a sparse file region gets its block here).
    ///
    /// # Errors
    /// Whatever the object's `dirty_page` returns; `ENOSPC` from a full
    /// file system being the interesting one.
    pub fn mark_dirty(&self) -> SysResult<()> {
        let obj = self.obj.upgrade().ok_or(SysError::EIO)?;
        obj.dirty_page(self.pageno)?;
        self.state.lock().dirty = true;
        Ok(())
    }

    /// Writes the frame back if dirty and clears the dirty bit. The frame
    /// is busy for the duration.
    pub fn clean(&self) -> SysResult<()> {
        {
            let mut state = self.state.lock();
            if !state.dirty {
                return Ok(());
            }
            state.dirty = false;
            state.busy = true;
        }
        let obj = self.obj.upgrade().ok_or(SysError::EIO)?;
        let res = obj.clean_page(self.pageno, self.as_slice());
        {
            let mut state = self.state.lock();
            state.busy = false;
            if res.is_err() {
                state.dirty = true;
            }
        }
        self.waiters.wake_all();
        res
    }

    /// Whether the frame may be dropped from the cache right now.
    pub fn reclaimable(&self) -> bool {
        let state = self.state.lock();
        state.pincount == 0 && !state.dirty && !state.busy
    }
}

impl core::fmt::Debug for PageFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = *self.state.lock();
        f.debug_struct("PageFrame")
            .field("pageno", &self.pageno)
            .field("ppn", &self.ppn())
            .field("pin", &state.pincount)
            .field("dirty", &state.dirty)
            .field("busy", &state.busy)
            .finish()
    }
}

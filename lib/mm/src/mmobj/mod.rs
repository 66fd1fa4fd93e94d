//! Memory objects: polymorphic sources of pages.
//!
//! A memory object answers page-cache misses ([`MemObject::fill_page`]) and
//! write-backs ([`MemObject::clean_page`]), and keeps the residence table of
//! its cached frames. Four kinds exist: anonymous (zero fill, here),
//! shadow (copy-on-write overlay, here), block device (here), and
//! vnode-backed (in the VFS crate, where the vnode type lives).
//!
//! The `ref`/`unref` pair of the classical operation vector is carried by
//! `Arc`: a shadow holds a strong reference down to the object it shadows
//! and nothing points back up, so every chain is acyclic by construction
//! and dies bottom-last.

mod anon;
mod block;
mod shadow;

pub use anon::AnonObject;
pub use block::BlockObject;
pub use shadow::ShadowObject;

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};

use downcast_rs::{DowncastSync, impl_downcast};
use mutex::SpinNoIrqLock;
use systype::SysResult;

use crate::pframe::PageFrame;

static OBJECT_IDS: AtomicUsize = AtomicUsize::new(1);

/// State common to every memory object.
pub struct MemObjMeta {
    id: usize,
    /// Resident frames of this object, by page number. The uniqueness of
    /// (object, page number) in the page cache is exactly the uniqueness
    /// of keys in this map.
    pages: SpinNoIrqLock<BTreeMap<usize, Arc<PageFrame>>>,
}

impl MemObjMeta {
    pub fn new() -> Self {
        Self {
            id: OBJECT_IDS.fetch_add(1, Ordering::Relaxed),
            pages: SpinNoIrqLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemObjMeta {
    fn default() -> Self {
        Self::new()
    }
}

pub trait MemObject: Send + Sync + DowncastSync {
    fn meta(&self) -> &MemObjMeta;

    /// Produces the contents of page `pageno` into `buf` (one page).
    fn fill_page(&self, pageno: usize, buf: &mut [u8]) -> SysResult<()>;

    /// Writes one page back to the backing store. Objects without a store
    /// keep dirty pages resident instead.
    fn clean_page(&self, _pageno: usize, _buf: &[u8]) -> SysResult<()> {
        Ok(())
    }

    /// Called before a page is first dirtied, so the backing store can
    /// reserve space. `ENOSPC` here aborts the write.
    fn dirty_page(&self, _pageno: usize) -> SysResult<()> {
        Ok(())
    }

    /// The object this one shadows; `None` for every non-shadow object.
    fn shadowed(&self) -> Option<&Arc<dyn MemObject>> {
        None
    }
}

impl_downcast!(sync MemObject);

impl dyn MemObject {
    pub fn id(&self) -> usize {
        self.meta().id
    }

    /// The resident frame for `pageno`, without faulting one in.
    pub fn resident(&self, pageno: usize) -> Option<Arc<PageFrame>> {
        self.meta().pages.lock().get(&pageno).cloned()
    }

    pub fn nresident(&self) -> usize {
        self.meta().pages.lock().len()
    }

    /// Returns the frame for (`self`, `pageno`), filling it in on a miss.
    ///
    /// May block: on the device read of a fill, or on another thread's
    /// in-flight fill of the same key. The returned frame is ready.
    pub fn get_page(self: &Arc<Self>, pageno: usize) -> SysResult<Arc<PageFrame>> {
        loop {
            let hit = self.resident(pageno);
            if let Some(frame) = hit {
                if frame.is_busy() {
                    frame.wait_not_busy();
                    // The fill may have failed and dropped the frame;
                    // look the key up again.
                    continue;
                }
                return Ok(frame);
            }

            let frame = Arc::new(PageFrame::build(self, pageno)?);
            {
                let mut pages = self.meta().pages.lock();
                if pages.contains_key(&pageno) {
                    // Another thread slipped in; retry against its frame.
                    continue;
                }
                pages.insert(pageno, Arc::clone(&frame));
            }
            // Fill with the residence table unlocked; contenders block on
            // the busy flag, per key rather than globally.
            match self.fill_page(pageno, frame.as_mut_slice()) {
                Ok(()) => {
                    frame.fill_done();
                    return Ok(frame);
                }
                Err(err) => {
                    self.meta().pages.lock().remove(&pageno);
                    frame.fill_done();
                    return Err(err);
                }
            }
        }
    }

    /// The non-shadow object at the end of the chain starting here.
    /// Finite and unique for every well-formed chain; `self` when this
    /// object is not a shadow.
    pub fn bottom(self: &Arc<Self>) -> Arc<dyn MemObject> {
        let mut obj = Arc::clone(self);
        while let Some(below) = obj.shadowed() {
            let below = Arc::clone(below);
            obj = below;
        }
        obj
    }

    /// Resolves a page through the shadow chain.
    ///
    /// For a read (`for_write == false`) the first object in the chain
    /// with the page resident wins, and no new frame is created anywhere
    /// except at the bottom; the caller must treat the result as
    /// read-only. For a write the page is materialized in `self` (the
    /// topmost object), copying from below on a miss.
    pub fn lookup_page(self: &Arc<Self>, pageno: usize, for_write: bool) -> SysResult<Arc<PageFrame>> {
        if for_write {
            return self.get_page(pageno);
        }
        let mut obj = Arc::clone(self);
        loop {
            if obj.shadowed().is_none() {
                // Bottom object: faulting the page in here is the read
                // path's only allocation.
                return obj.get_page(pageno);
            }
            if let Some(frame) = obj.resident(pageno) {
                if frame.is_busy() {
                    frame.wait_not_busy();
                }
                return Ok(frame);
            }
            let below = Arc::clone(obj.shadowed().expect("checked above"));
            obj = below;
        }
    }

    /// Snapshot of the residence table. File systems walk this to write
    /// pages back through their own hooks when tearing a vnode down.
    pub fn resident_pages(&self) -> Vec<(usize, Arc<PageFrame>)> {
        self.meta()
            .pages
            .lock()
            .iter()
            .map(|(&pageno, frame)| (pageno, Arc::clone(frame)))
            .collect()
    }

    /// Writes back every dirty resident page.
    pub fn flush(&self) -> SysResult<()> {
        let frames: Vec<Arc<PageFrame>> = self.meta().pages.lock().values().cloned().collect();
        for frame in frames {
            frame.clean()?;
        }
        Ok(())
    }

    /// Drops every unpinned, clean, non-busy frame.
    pub fn reclaim(&self) {
        self.meta()
            .pages
            .lock()
            .retain(|_, frame| !frame.reclaimable());
    }
}

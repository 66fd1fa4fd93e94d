use alloc::sync::{Arc, Weak};

use mm::mmobj::{MemObjMeta, MemObject};
use systype::{SysError, SysResult};

use crate::vnode::Vnode;

/// The memory object of a vnode. Fills and cleans resolve through the
/// vnode's page hooks, which is where a file system turns page numbers
/// into disk blocks.
///
/// Faults on a shared file mapping, private-mapping bottom fills, and the
/// read/write paths of the file system all meet in this object's page
/// table, which is what makes a write through one visible to the others.
pub struct VnodeObject {
    meta: MemObjMeta,
    vnode: Weak<dyn Vnode>,
}

impl VnodeObject {
    pub(crate) fn new(vnode: &Arc<dyn Vnode>) -> Arc<Self> {
        Arc::new(Self {
            meta: MemObjMeta::new(),
            vnode: Arc::downgrade(vnode),
        })
    }

    fn vnode(&self) -> SysResult<Arc<dyn Vnode>> {
        self.vnode.upgrade().ok_or(SysError::EIO)
    }
}

impl MemObject for VnodeObject {
    fn meta(&self) -> &MemObjMeta {
        &self.meta
    }

    fn fill_page(&self, pageno: usize, buf: &mut [u8]) -> SysResult<()> {
        self.vnode()?.fill_page(pageno, buf)
    }

    fn clean_page(&self, pageno: usize, buf: &[u8]) -> SysResult<()> {
        self.vnode()?.clean_page(pageno, buf)
    }

    fn dirty_page(&self, pageno: usize) -> SysResult<()> {
        self.vnode()?.dirty_page(pageno)
    }
}

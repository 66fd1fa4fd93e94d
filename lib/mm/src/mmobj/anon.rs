use alloc::sync::Arc;

use systype::SysResult;

use super::{MemObjMeta, MemObject};

/// Zero-filled pages with no backing store. Backs `MAP_ANON` mappings and
/// sits at the bottom of the shadow chains of private anonymous areas; an
/// anonymous object is never itself a shadow.
pub struct AnonObject {
    meta: MemObjMeta,
}

impl AnonObject {
    pub fn new() -> Arc<dyn MemObject> {
        Arc::new(Self {
            meta: MemObjMeta::new(),
        })
    }
}

impl MemObject for AnonObject {
    fn meta(&self) -> &MemObjMeta {
        &self.meta
    }

    fn fill_page(&self, _pageno: usize, buf: &mut [u8]) -> SysResult<()> {
        buf.fill(0);
        Ok(())
    }
}

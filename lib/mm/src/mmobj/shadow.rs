use alloc::sync::Arc;

use systype::SysResult;

use super::{MemObjMeta, MemObject};

/// A copy-on-write overlay. Pages resident here mask the same page numbers
/// in the chain below; pages absent here are found by walking down.
///
/// `fork` interposes a fresh shadow over each private area's object in both
/// parent and child, so writes after the fork land in the writer's own top
/// shadow and the two sides diverge. Nested forks stack further shadows;
/// the chain stays linear because a shadow only ever points down.
pub struct ShadowObject {
    meta: MemObjMeta,
    below: Arc<dyn MemObject>,
}

impl ShadowObject {
    /// Creates a shadow over `below`, which gains a strong reference.
    pub fn new(below: Arc<dyn MemObject>) -> Arc<dyn MemObject> {
        Arc::new(Self {
            meta: MemObjMeta::new(),
            below,
        })
    }
}

impl MemObject for ShadowObject {
    fn meta(&self) -> &MemObjMeta {
        &self.meta
    }

    /// A miss in this shadow is satisfied by the first hit further down,
    /// copied into the new frame; dirty pages of this shadow never leave it.
    fn fill_page(&self, pageno: usize, buf: &mut [u8]) -> SysResult<()> {
        let mut obj = Arc::clone(&self.below);
        loop {
            if obj.shadowed().is_none() {
                let frame = obj.get_page(pageno)?;
                buf.copy_from_slice(frame.as_slice());
                return Ok(());
            }
            if let Some(frame) = obj.resident(pageno) {
                if frame.is_busy() {
                    frame.wait_not_busy();
                }
                buf.copy_from_slice(frame.as_slice());
                return Ok(());
            }
            let below = Arc::clone(obj.shadowed().expect("checked above"));
            obj = below;
        }
    }

    fn shadowed(&self) -> Option<&Arc<dyn MemObject>> {
        Some(&self.below)
    }
}

use alloc::sync::Arc;

use config::device::BLOCK_SIZE;
use driver::BlockDevice;
use systype::{SysError, SysResult};

use super::{MemObjMeta, MemObject};

/// The page-cache face of a block device: page number N is block N. The
/// file systems read their metadata blocks (superblock, inode blocks,
/// indirect blocks) through one of these.
pub struct BlockObject {
    meta: MemObjMeta,
    dev: Arc<dyn BlockDevice>,
}

impl BlockObject {
    pub fn new(dev: Arc<dyn BlockDevice>) -> Arc<Self> {
        Arc::new(Self {
            meta: MemObjMeta::new(),
            dev,
        })
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }
}

impl MemObject for BlockObject {
    fn meta(&self) -> &MemObjMeta {
        &self.meta
    }

    fn fill_page(&self, pageno: usize, buf: &mut [u8]) -> SysResult<()> {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        if pageno >= self.dev.block_count() {
            return Err(SysError::EINVAL);
        }
        self.dev.read_block(pageno, buf)
    }

    fn clean_page(&self, pageno: usize, buf: &[u8]) -> SysResult<()> {
        debug_assert_eq!(buf.len(), BLOCK_SIZE);
        if pageno >= self.dev.block_count() {
            return Err(SysError::EINVAL);
        }
        self.dev.write_block(pageno, buf)
    }
}

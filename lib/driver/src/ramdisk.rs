use alloc::vec;
use alloc::vec::Vec;

use config::device::{BLOCK_SIZE, DevId};
use mutex::SpinNoIrqLock;
use systype::SysResult;

use crate::BlockDevice;
use crate::block::check_block;

/// A memory-backed block device. Serves as the root disk under QEMU-less
/// runs and as the disk the file-system tests format and remount.
pub struct RamDisk {
    id: DevId,
    blocks: usize,
    data: SpinNoIrqLock<Vec<u8>>,
}

impl RamDisk {
    pub fn new(id: DevId, blocks: usize) -> Self {
        Self {
            id,
            blocks,
            data: SpinNoIrqLock::new(vec![0; blocks * BLOCK_SIZE]),
        }
    }
}

impl BlockDevice for RamDisk {
    fn dev_id(&self) -> DevId {
        self.id
    }

    fn block_count(&self) -> usize {
        self.blocks
    }

    fn read_block(&self, block: usize, buf: &mut [u8]) -> SysResult<()> {
        check_block(block, buf.len(), self.blocks)?;
        let data = self.data.lock();
        buf.copy_from_slice(&data[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block: usize, buf: &[u8]) -> SysResult<()> {
        check_block(block, buf.len(), self.blocks)?;
        let mut data = self.data.lock();
        data[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

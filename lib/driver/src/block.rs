use config::device::{BLOCK_SIZE, DevId};
use downcast_rs::{DowncastSync, impl_downcast};
use systype::SysResult;

/// A device read and written in [`BLOCK_SIZE`] units.
///
/// One block spans one page, so a block device doubles as a page source:
/// the memory-object adapter over it maps page number N to block N.
/// Implementations may suspend the calling thread; never call from an
/// interrupt handler.
pub trait BlockDevice: Send + Sync + DowncastSync {
    fn dev_id(&self) -> DevId;

    /// Number of blocks on the device.
    fn block_count(&self) -> usize;

    /// Reads block `block` into `buf`. `buf` must hold [`BLOCK_SIZE`] bytes.
    fn read_block(&self, block: usize, buf: &mut [u8]) -> SysResult<()>;

    /// Writes `buf` to block `block`. `buf` must hold [`BLOCK_SIZE`] bytes.
    fn write_block(&self, block: usize, buf: &[u8]) -> SysResult<()>;
}

impl_downcast!(sync BlockDevice);

/// Checks a caller-supplied buffer against the block geometry.
pub(crate) fn check_block(block: usize, len: usize, count: usize) -> SysResult<()> {
    use systype::SysError;
    if len != BLOCK_SIZE {
        return Err(SysError::EINVAL);
    }
    if block >= count {
        return Err(SysError::EINVAL);
    }
    Ok(())
}

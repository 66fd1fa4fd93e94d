use config::device::DevId;
use config::inode::VnodeType;

/// File status, the subset of `struct stat` this kernel maintains.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub st_ino: u32,
    pub st_type: VnodeType,
    pub st_nlink: u32,
    pub st_size: usize,
    pub st_rdev: DevId,
    pub st_blksize: usize,
    /// Blocks actually allocated; sparse regions do not count.
    pub st_blocks: usize,
}

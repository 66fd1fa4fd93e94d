//! The vnode, the in-memory handle for one file-system object.
//!
//! File systems implement [`Vnode`] per object kind; callers go through the
//! trait. Every operation entry point takes the vnode's sleep lock itself
//! and releases it on all exits; during a path walk locks nest parent
//! before child.
//!
//! At most one vnode is live per (fs, ino); see [`crate::vcache`].

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::sync::{Arc, Weak};

use config::device::DevId;
use config::inode::VnodeType;
use downcast_rs::{DowncastSync, impl_downcast};
use mm::mmobj::MemObject;
use mutex::SleepMutex;
use spin::Once;
use systype::{SysError, SysResult, SyscallResult};

use crate::dirent::DirEntry;
use crate::fs::FileSystem;
use crate::stat::Stat;
use crate::vobject::VnodeObject;

pub struct VnodeMeta {
    pub fs: Weak<dyn FileSystem>,
    pub ino: u32,
    pub vtype: VnodeType,
    /// Device identity, for char/block special files only.
    pub devid: DevId,
    /// File length in bytes, kept current by the file system.
    pub len: AtomicUsize,
    /// The per-vnode mutex. Serializes every operation on this vnode.
    pub lock: SleepMutex<()>,
    /// The file's page-cache handle, created on first use.
    object: Once<Arc<VnodeObject>>,
}

impl VnodeMeta {
    pub fn new(fs: &Arc<dyn FileSystem>, ino: u32, vtype: VnodeType, devid: DevId, len: usize) -> Self {
        Self {
            fs: Arc::downgrade(fs),
            ino,
            vtype,
            devid,
            len: AtomicUsize::new(len),
            lock: SleepMutex::new(()),
            object: Once::new(),
        }
    }

    /// The memory object, if one was ever created for this vnode. File
    /// systems use this on teardown paths where no `Arc` of the vnode
    /// remains to call [`<dyn Vnode>::object`] with.
    pub fn object_if_init(&self) -> Option<&Arc<VnodeObject>> {
        self.object.get()
    }
}

/// Error for a data access on a vnode without file contents.
fn not_a_file(meta: &VnodeMeta) -> SysError {
    if meta.vtype.is_dir() {
        SysError::EISDIR
    } else {
        SysError::EINVAL
    }
}

pub trait Vnode: Send + Sync + DowncastSync {
    fn meta(&self) -> &VnodeMeta;

    /// Reads up to `buf.len()` bytes at byte offset `off`; returns the
    /// count read, 0 at end of file.
    fn read_at(&self, _off: usize, _buf: &mut [u8]) -> SyscallResult {
        Err(not_a_file(self.meta()))
    }

    /// Writes `buf` at byte offset `off`, extending the file as needed;
    /// returns the count written.
    fn write_at(&self, _off: usize, _buf: &[u8]) -> SyscallResult {
        Err(not_a_file(self.meta()))
    }

    fn lookup(&self, _name: &str) -> SysResult<Arc<dyn Vnode>> {
        Err(SysError::ENOTDIR)
    }

    /// Creates a regular file `name` and returns its vnode.
    fn create(&self, _name: &str) -> SysResult<Arc<dyn Vnode>> {
        Err(SysError::ENOTDIR)
    }

    /// Creates a device special file.
    fn mknod(&self, _name: &str, _vtype: VnodeType, _devid: DevId) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    /// Makes `name` a new hard link to `target`.
    fn link(&self, _target: &Arc<dyn Vnode>, _name: &str) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    fn unlink(&self, _name: &str) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    fn mkdir(&self, _name: &str) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    fn rmdir(&self, _name: &str) -> SysResult<()> {
        Err(SysError::ENOTDIR)
    }

    /// Reads the entry at directory offset `off`. Returns the offset
    /// advance and the entry, or `None` past the last entry.
    fn readdir(&self, _off: usize) -> SysResult<Option<(usize, DirEntry)>> {
        Err(SysError::ENOTDIR)
    }

    fn stat(&self) -> SysResult<Stat>;

    /// Page-cache hooks, meaningful for objects with file contents. The
    /// vnode-backed memory object delegates here.
    fn fill_page(&self, _pageno: usize, _buf: &mut [u8]) -> SysResult<()> {
        Err(SysError::EINVAL)
    }

    fn dirty_page(&self, _pageno: usize) -> SysResult<()> {
        Err(SysError::EINVAL)
    }

    fn clean_page(&self, _pageno: usize, _buf: &[u8]) -> SysResult<()> {
        Err(SysError::EINVAL)
    }
}

impl_downcast!(sync Vnode);

impl dyn Vnode {
    pub fn ino(&self) -> u32 {
        self.meta().ino
    }

    pub fn vtype(&self) -> VnodeType {
        self.meta().vtype
    }

    pub fn devid(&self) -> DevId {
        self.meta().devid
    }

    pub fn fs(&self) -> Arc<dyn FileSystem> {
        self.meta().fs.upgrade().expect("vnode outlived file system")
    }

    pub fn len(&self) -> usize {
        self.meta().len.load(Ordering::Relaxed)
    }

    pub fn set_len(&self, len: usize) {
        self.meta().len.store(len, Ordering::Relaxed)
    }

    /// The vnode's memory object, through which its pages are cached and
    /// which `mmap` installs behind mappings of this file.
    pub fn object(self: &Arc<Self>) -> Arc<dyn MemObject> {
        let obj = self
            .meta()
            .object
            .call_once(|| VnodeObject::new(self));
        Arc::clone(obj) as Arc<dyn MemObject>
    }
}

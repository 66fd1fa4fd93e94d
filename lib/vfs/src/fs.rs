use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use downcast_rs::{DowncastSync, impl_downcast};
use systype::SysResult;

use crate::vcache;
use crate::vnode::Vnode;

static FS_IDS: AtomicUsize = AtomicUsize::new(1);

pub struct FileSystemMeta {
    id: usize,
    /// The `"diskN"` style name the file system was mounted from.
    pub dev_name: String,
    pub root_ino: u32,
}

impl FileSystemMeta {
    pub fn new(dev_name: String, root_ino: u32) -> Self {
        Self {
            id: FS_IDS.fetch_add(1, Ordering::Relaxed),
            dev_name,
            root_ino,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

/// One mounted file system.
pub trait FileSystem: Send + Sync + DowncastSync {
    fn meta(&self) -> &FileSystemMeta;

    /// Materializes the vnode for `ino` from the backing store. Called by
    /// [`vcache::vget`] on a cache miss only; everyone else goes through
    /// `vget`.
    fn read_vnode(self: Arc<Self>, ino: u32) -> SysResult<Arc<dyn Vnode>>;

    /// Tears down a dying vnode: the last in-memory reference is gone.
    /// The file system writes the inode back, and may free it when no
    /// directory entries remain.
    fn delete_vnode(&self, vnode: &dyn Vnode);

    /// Whether the object behind `vnode` still exists on disk, i.e. is
    /// reachable from a directory entry.
    fn query_vnode(&self, vnode: &dyn Vnode) -> bool;

    /// Writes every dirty page and the superblock back to the device.
    fn sync(&self) -> SysResult<()>;

    /// Validates and detaches the file system. Consistency failures at
    /// this point are corruption and panic.
    fn unmount(self: Arc<Self>) -> SysResult<()>;
}

impl_downcast!(sync FileSystem);

impl dyn FileSystem {
    pub fn id(&self) -> usize {
        self.meta().id()
    }

    /// The root directory's vnode.
    pub fn root(self: &Arc<Self>) -> SysResult<Arc<dyn Vnode>> {
        vcache::vget(self, self.meta().root_ino)
    }
}

use alloc::sync::Arc;

use mutex::SpinNoIrqLock;
use systype::{SysError, SysResult};

use crate::fs::FileSystem;
use crate::vnode::Vnode;

/// The mount table. One slot: everything hangs off the root file system.
static ROOT_FS: SpinNoIrqLock<Option<Arc<dyn FileSystem>>> = SpinNoIrqLock::new(None);

pub fn mount_root(fs: Arc<dyn FileSystem>) {
    let mut root = ROOT_FS.lock();
    assert!(root.is_none(), "root file system already mounted");
    log::info!("[mount_root] fs {} on /", fs.meta().dev_name);
    *root = Some(fs);
}

pub fn root_fs() -> SysResult<Arc<dyn FileSystem>> {
    ROOT_FS.lock().clone().ok_or(SysError::ENODEV)
}

/// The root directory's vnode, the origin of absolute path walks.
pub fn root_vnode() -> SysResult<Arc<dyn Vnode>> {
    root_fs()?.root()
}

/// Detaches the root file system, handing it to the file system's own
/// unmount for validation and write-back. The caller must have released
/// every vnode reference (cwds, open files) first.
pub fn unmount_root() -> SysResult<()> {
    let fs = ROOT_FS.lock().take().ok_or(SysError::ENODEV)?;
    fs.unmount()
}

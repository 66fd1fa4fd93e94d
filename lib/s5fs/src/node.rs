//! S5FS vnodes.
//!
//! One [`S5Node`] backs every live file-system object: regular files and
//! directories carry data through their memory object, device nodes route
//! to the driver registry. Each operation entry point takes the vnode's
//! sleep lock and calls into [`crate::subr`], which assumes it held.
//!
//! The in-core inode carries one link count more than the on-disk one
//! while the vnode lives: `load` adds the bias, `teardown` removes it and
//! frees the inode when no directory entries remain.

use alloc::sync::Arc;

use config::device::DevId;
use config::inode::VnodeType;
use driver::lookup_char_device;
use mm::mmobj::MemObject;
use mutex::{SleepMutexGuard, SpinNoIrqLock};
use systype::{SysError, SysResult, SyscallResult};
use vfs::{DirEntry, FileSystem, Stat, Vnode, VnodeMeta, vcache, vget};

use crate::fs::S5FileSystem;
use crate::layout::*;
use crate::subr;

pub struct S5Node {
    meta: VnodeMeta,
    fs: Arc<S5FileSystem>,
    inode: SpinNoIrqLock<S5Inode>,
}

impl S5Node {
    /// Reads inode `ino` in and builds its vnode, applying the in-core
    /// link-count bias.
    pub(crate) fn load(fs: &Arc<S5FileSystem>, ino: u32) -> SysResult<Arc<dyn Vnode>> {
        let mut inode = fs.read_inode(ino)?;
        let vtype = match inode.vtype {
            S5_TYPE_DATA => VnodeType::Regular,
            S5_TYPE_DIR => VnodeType::Dir,
            S5_TYPE_CHR => VnodeType::CharDev,
            S5_TYPE_BLK => VnodeType::BlockDev,
            _ => {
                log::warn!("[s5fs_read_vnode] ino {ino} has type {}", inode.vtype);
                return Err(SysError::EIO);
            }
        };
        inode.linkcount += 1;
        fs.write_inode(ino, &inode)?;

        let devid: DevId = if vtype.is_device() { inode.indirect } else { 0 };
        let fsdyn: Arc<dyn FileSystem> = Arc::clone(fs) as Arc<dyn FileSystem>;
        let node: Arc<dyn Vnode> = Arc::new(Self {
            meta: VnodeMeta::new(&fsdyn, ino, vtype, devid, inode.size as usize),
            fs: Arc::clone(fs),
            inode: SpinNoIrqLock::new(inode),
        });
        // Materialize the page-cache handle while an Arc is at hand.
        let _ = node.object();
        log::debug!("[s5fs_read_vnode] ino {ino} type {vtype:?}");
        Ok(node)
    }

    pub(crate) fn ino(&self) -> u32 {
        self.meta.ino
    }

    pub(crate) fn fs(&self) -> &Arc<S5FileSystem> {
        &self.fs
    }

    pub(crate) fn fs_dyn(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.fs) as Arc<dyn FileSystem>
    }

    pub(crate) fn object(&self) -> Arc<dyn MemObject> {
        Arc::clone(self.meta.object_if_init().expect("object created at load")) as Arc<dyn MemObject>
    }

    pub(crate) fn set_len(&self, len: usize) {
        self.meta.len.store(len, core::sync::atomic::Ordering::Relaxed);
    }

    pub(crate) fn with_inode<R>(&self, f: impl FnOnce(&S5Inode) -> R) -> R {
        f(&self.inode.lock())
    }

    /// Applies `f` to the in-core inode and writes the result through to
    /// the inode's page.
    pub(crate) fn update_inode(&self, f: impl FnOnce(&mut S5Inode)) -> SysResult<()> {
        let copy = {
            let mut inode = self.inode.lock();
            f(&mut inode);
            *inode
        };
        self.fs.write_inode(self.meta.ino, &copy)
    }

    /// The vnode lock, unless the current thread already holds it. The
    /// page hooks are reached both from the operation entry points (lock
    /// held) and from page faults (lock free).
    fn page_lock(&self) -> Option<SleepMutexGuard<'_, ()>> {
        if self.meta.lock.held_by_current() {
            None
        } else {
            Some(self.meta.lock.lock())
        }
    }

    fn require_dir(&self) -> SysResult<()> {
        if self.meta.vtype.is_dir() {
            Ok(())
        } else {
            Err(SysError::ENOTDIR)
        }
    }

    fn has_file_pages(&self) -> bool {
        matches!(self.meta.vtype, VnodeType::Regular | VnodeType::Dir)
    }

    /// Last-reference teardown, reached through the file system's
    /// `delete_vnode`: drop the in-core bias, then either write the inode
    /// and its dirty pages back, or free the inode when no links remain.
    pub(crate) fn teardown(&self, fs: &S5FileSystem) {
        let inode = {
            let mut inode = self.inode.lock();
            inode.linkcount -= 1;
            *inode
        };
        let ino = self.meta.ino;
        if inode.linkcount == 0 {
            // Unreachable from any directory: cached pages are dropped on
            // the floor and the blocks go back to the free lists.
            if let Err(err) = fs.free_inode(ino, &inode) {
                log::error!("[s5fs_delete_vnode] ino {ino}: {err:?}");
            }
        } else {
            if let Some(obj) = self.meta.object_if_init() {
                let objdyn: &dyn MemObject = obj.as_ref();
                for (pageno, frame) in objdyn.resident_pages() {
                    if !frame.is_dirty() {
                        continue;
                    }
                    // The object's weak vnode reference is already dead;
                    // write back through the hook directly.
                    if let Err(err) = self.clean_page(pageno, frame.as_slice()) {
                        log::error!("[s5fs_delete_vnode] ino {ino} page {pageno}: {err:?}");
                    }
                }
            }
            if let Err(err) = fs.write_inode(ino, &inode) {
                log::error!("[s5fs_delete_vnode] ino {ino}: {err:?}");
            }
        }
    }
}

impl Drop for S5Node {
    fn drop(&mut self) {
        // Unpublish before the first suspension point below, so a
        // concurrent vget cannot meet a half-dead vnode.
        vcache::forget(self.fs.meta().id(), self.meta.ino);
        let fs = Arc::clone(&self.fs);
        fs.delete_vnode(&*self);
    }
}

impl Vnode for S5Node {
    fn meta(&self) -> &VnodeMeta {
        &self.meta
    }

    fn read_at(&self, off: usize, buf: &mut [u8]) -> SyscallResult {
        match self.meta.vtype {
            VnodeType::Regular => {
                let _guard = self.meta.lock.lock();
                subr::read_file(self, off, buf)
            }
            VnodeType::CharDev => lookup_char_device(self.meta.devid)
                .ok_or(SysError::ENXIO)?
                .read(buf),
            VnodeType::Dir => Err(SysError::EISDIR),
            VnodeType::BlockDev => Err(SysError::EINVAL),
        }
    }

    fn write_at(&self, off: usize, buf: &[u8]) -> SyscallResult {
        match self.meta.vtype {
            VnodeType::Regular => {
                let _guard = self.meta.lock.lock();
                subr::write_file(self, off, buf)
            }
            VnodeType::CharDev => lookup_char_device(self.meta.devid)
                .ok_or(SysError::ENXIO)?
                .write(buf),
            VnodeType::Dir => Err(SysError::EISDIR),
            VnodeType::BlockDev => Err(SysError::EINVAL),
        }
    }

    fn lookup(&self, name: &str) -> SysResult<Arc<dyn Vnode>> {
        self.require_dir()?;
        let ino = {
            let _guard = self.meta.lock.lock();
            subr::find_dirent(self, name)?.ok_or(SysError::ENOENT)?.0
        };
        vget(&self.fs_dyn(), ino)
    }

    fn create(&self, name: &str) -> SysResult<Arc<dyn Vnode>> {
        self.require_dir()?;
        let _guard = self.meta.lock.lock();
        if subr::find_dirent(self, name)?.is_some() {
            return Err(SysError::EEXIST);
        }
        let ino = self.fs.alloc_inode(S5_TYPE_DATA, 0)?;
        let child = vget(&self.fs_dyn(), ino)?;
        let child_node = child.downcast_ref::<S5Node>().expect("own vnode");
        // On failure the dropped child reference frees the inode again.
        subr::dir_link(self, child_node, name)?;
        Ok(child)
    }

    fn mknod(&self, name: &str, vtype: VnodeType, devid: DevId) -> SysResult<()> {
        self.require_dir()?;
        let s5_type = match vtype {
            VnodeType::CharDev => S5_TYPE_CHR,
            VnodeType::BlockDev => S5_TYPE_BLK,
            _ => return Err(SysError::EINVAL),
        };
        let _guard = self.meta.lock.lock();
        if subr::find_dirent(self, name)?.is_some() {
            return Err(SysError::EEXIST);
        }
        let ino = self.fs.alloc_inode(s5_type, devid)?;
        let child = vget(&self.fs_dyn(), ino)?;
        let child_node = child.downcast_ref::<S5Node>().expect("own vnode");
        subr::dir_link(self, child_node, name)?;
        Ok(())
    }

    fn link(&self, target: &Arc<dyn Vnode>, name: &str) -> SysResult<()> {
        self.require_dir()?;
        if target.vtype().is_dir() {
            return Err(SysError::EPERM);
        }
        let target_node = target
            .downcast_ref::<S5Node>()
            .ok_or(SysError::EINVAL)?;
        if target_node.fs.meta().id() != self.fs.meta().id() {
            return Err(SysError::EINVAL);
        }
        let _guard = self.meta.lock.lock();
        subr::dir_link(self, target_node, name)
    }

    fn unlink(&self, name: &str) -> SysResult<()> {
        self.require_dir()?;
        let _guard = self.meta.lock.lock();
        let (ino, _) = subr::find_dirent(self, name)?.ok_or(SysError::ENOENT)?;
        if self.fs.read_inode(ino)?.vtype == S5_TYPE_DIR {
            return Err(SysError::EPERM);
        }
        subr::dir_unlink(self, name)
    }

    fn mkdir(&self, name: &str) -> SysResult<()> {
        self.require_dir()?;
        let _guard = self.meta.lock.lock();
        if subr::find_dirent(self, name)?.is_some() {
            return Err(SysError::EEXIST);
        }
        let ino = self.fs.alloc_inode(S5_TYPE_DIR, 0)?;
        let child = vget(&self.fs_dyn(), ino)?;
        let child_node = child.downcast_ref::<S5Node>().expect("own vnode");
        subr::dir_link(self, child_node, name)?;

        let child_guard = child_node.meta.lock.lock();
        if let Err(err) = subr::dir_link(child_node, child_node, ".")
            .and_then(|()| subr::dir_link(child_node, self, ".."))
        {
            drop(child_guard);
            subr::dir_unlink(self, name)?;
            return Err(err);
        }
        Ok(())
    }

    fn rmdir(&self, name: &str) -> SysResult<()> {
        self.require_dir()?;
        if name == "." {
            return Err(SysError::EINVAL);
        }
        if name == ".." {
            return Err(SysError::ENOTEMPTY);
        }
        let _guard = self.meta.lock.lock();
        let (ino, _) = subr::find_dirent(self, name)?.ok_or(SysError::ENOENT)?;
        let child = vget(&self.fs_dyn(), ino)?;
        if !child.vtype().is_dir() {
            return Err(SysError::ENOTDIR);
        }
        let child_node = child.downcast_ref::<S5Node>().expect("own vnode");

        let child_guard = child_node.meta.lock.lock();
        let mut off = 0;
        while let Some((advance, entry)) = subr::read_dirent(child_node, off)? {
            if entry.name != "." && entry.name != ".." {
                return Err(SysError::ENOTEMPTY);
            }
            off += advance;
        }
        // The ".." removal drops our own link count.
        subr::dir_unlink(child_node, "..")?;
        drop(child_guard);
        subr::dir_unlink(self, name)
    }

    fn readdir(&self, off: usize) -> SysResult<Option<(usize, DirEntry)>> {
        self.require_dir()?;
        let _guard = self.meta.lock.lock();
        subr::read_dirent(self, off)
    }

    fn stat(&self) -> SysResult<Stat> {
        let _guard = self.meta.lock.lock();
        let blocks = if self.has_file_pages() {
            subr::inode_blocks(self)?
        } else {
            0
        };
        Ok(self.with_inode(|inode| Stat {
            st_ino: self.meta.ino,
            st_type: self.meta.vtype,
            st_nlink: inode.linkcount as u32,
            st_size: inode.size as usize,
            st_rdev: self.meta.devid,
            st_blksize: S5_BLOCK_SIZE,
            st_blocks: blocks,
        }))
    }

    fn fill_page(&self, pageno: usize, buf: &mut [u8]) -> SysResult<()> {
        if !self.has_file_pages() {
            return Err(SysError::EINVAL);
        }
        let _guard = self.page_lock();
        let block = subr::seek_to_block(self, pageno * S5_BLOCK_SIZE, false)?;
        if block == 0 {
            // Sparse: reads see zeros.
            buf.fill(0);
            Ok(())
        } else {
            self.fs.device().read_block(block as usize, buf)
        }
    }

    fn dirty_page(&self, pageno: usize) -> SysResult<()> {
        if !self.has_file_pages() {
            return Err(SysError::EINVAL);
        }
        let _guard = self.page_lock();
        if subr::seek_to_block(self, pageno * S5_BLOCK_SIZE, false)? != 0 {
            return Ok(());
        }
        // Sparse region about to be written: give it a block now.
        subr::seek_to_block(self, pageno * S5_BLOCK_SIZE, true).map(|_| ())
    }

    fn clean_page(&self, pageno: usize, buf: &[u8]) -> SysResult<()> {
        if !self.has_file_pages() {
            return Err(SysError::EINVAL);
        }
        let _guard = self.page_lock();
        let block = subr::seek_to_block(self, pageno * S5_BLOCK_SIZE, true)?;
        self.fs.device().write_block(block as usize, buf)
    }
}

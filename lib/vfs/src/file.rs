//! Open-file descriptions.
//!
//! A [`File`] is what a file descriptor points at: a vnode plus a mode and
//! a seek position. `dup` and `fork` share the same `Arc<File>`, so the
//! position is shared too, which is exactly UNIX's behavior.

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::sync::Arc;

use config::vfs::{FileMode, SeekFrom};
use systype::{SysError, SysResult, SyscallResult};

use crate::vnode::Vnode;

pub struct File {
    vnode: Arc<dyn Vnode>,
    mode: FileMode,
    pos: AtomicUsize,
}

impl File {
    pub fn new(vnode: Arc<dyn Vnode>, mode: FileMode) -> Arc<Self> {
        Arc::new(Self {
            vnode,
            mode,
            pos: AtomicUsize::new(0),
        })
    }

    pub fn vnode(&self) -> &Arc<dyn Vnode> {
        &self.vnode
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn pos(&self) -> usize {
        self.pos.load(Ordering::Relaxed)
    }

    fn set_pos(&self, pos: usize) {
        self.pos.store(pos, Ordering::Relaxed)
    }

    /// Reads at the current position and advances it by the count read.
    pub fn read(&self, buf: &mut [u8]) -> SyscallResult {
        if !self.mode.contains(FileMode::READ) {
            return Err(SysError::EBADF);
        }
        let pos = self.pos();
        let count = self.vnode.read_at(pos, buf)?;
        self.set_pos(pos + count);
        Ok(count)
    }

    /// Writes at the current position (end of file in append mode) and
    /// advances it by the count written.
    pub fn write(&self, buf: &[u8]) -> SyscallResult {
        if !self.mode.contains(FileMode::WRITE) {
            return Err(SysError::EBADF);
        }
        let pos = if self.mode.contains(FileMode::APPEND) {
            self.vnode.len()
        } else {
            self.pos()
        };
        let count = self.vnode.write_at(pos, buf)?;
        self.set_pos(pos + count);
        Ok(count)
    }

    pub fn seek(&self, from: SeekFrom) -> SyscallResult {
        let new_pos = match from {
            SeekFrom::Start(off) => off as isize,
            SeekFrom::Current(off) => self.pos() as isize + off,
            SeekFrom::End(off) => self.vnode.len() as isize + off,
        };
        if new_pos < 0 {
            return Err(SysError::EINVAL);
        }
        self.set_pos(new_pos as usize);
        Ok(new_pos as usize)
    }

    /// Reads the directory entry at the current position.
    pub fn readdir(&self) -> SysResult<Option<crate::DirEntry>> {
        let pos = self.pos();
        match self.vnode.readdir(pos)? {
            Some((advance, entry)) => {
                self.set_pos(pos + advance);
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }
}

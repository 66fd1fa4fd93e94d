//! File-level subroutines.
//!
//! Everything here requires the caller to hold the vnode's lock (the
//! operation entry points in [`crate::node`] take it). Data moves through
//! the file's memory object page by page; block allocation happens as a
//! side effect of dirtying pages.

use config::inode::VnodeType;
use systype::{SysError, SysResult, SyscallResult};
use vfs::{DirEntry, vget};

use crate::layout::*;
use crate::node::S5Node;

/// Translates byte offset `off` into a disk block number.
///
/// Returns 0 for a sparse position when `alloc` is false. With `alloc`,
/// a missing data block (and, for the indirect range, a missing indirect
/// block) is allocated and installed, and the inode is written back.
///
/// # Errors
/// `EINVAL` past the maximum file size; `ENOSPC` when allocation fails.
pub fn seek_to_block(node: &S5Node, off: usize, alloc: bool) -> SysResult<u32> {
    let fileblock = off / S5_BLOCK_SIZE;
    if fileblock >= S5_MAX_FILE_BLOCKS {
        return Err(SysError::EINVAL);
    }
    let fs = node.fs();

    if fileblock < S5_NDIRECT {
        let block = node.with_inode(|inode| inode.direct[fileblock]);
        if block != 0 || !alloc {
            return Ok(block);
        }
        let block = fs.alloc_block()?;
        node.update_inode(|inode| inode.direct[fileblock] = block)?;
        return Ok(block);
    }

    let slot = fileblock - S5_NDIRECT;
    let mut indirect = node.with_inode(|inode| inode.indirect);
    if indirect == 0 {
        if !alloc {
            return Ok(0);
        }
        indirect = fs.alloc_block()?;
        // Fresh indirect block: every slot must read as unallocated.
        let frame = fs.obj().get_page(indirect as usize)?;
        frame.as_mut_slice().fill(0);
        frame.mark_dirty()?;
        if let Err(err) = node.update_inode(|inode| inode.indirect = indirect) {
            fs.free_block(indirect)?;
            return Err(err);
        }
    }

    let frame = fs.obj().get_page(indirect as usize)?;
    let entry = unsafe { &mut *(frame.kernel_addr() as *mut u32).add(slot) };
    if *entry != 0 || !alloc {
        return Ok(*entry);
    }
    let block = fs.alloc_block()?;
    *entry = block;
    frame.mark_dirty()?;
    Ok(block)
}

/// Blocks actually allocated to the file, the indirect block included.
pub fn inode_blocks(node: &S5Node) -> SysResult<usize> {
    let fs = node.fs();
    let (direct, indirect) =
        node.with_inode(|inode| (inode.direct, inode.indirect));
    let mut count = direct.iter().filter(|&&b| b != 0).count();
    if indirect != 0 {
        count += 1;
        let frame = fs.obj().get_page(indirect as usize)?;
        for slot in 0..S5_NIDIRECT {
            if unsafe { *(frame.kernel_addr() as *const u32).add(slot) } != 0 {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Reads up to `buf.len()` bytes at `off` through the file's pages.
/// Returns the count read; 0 at or past end of file.
pub fn read_file(node: &S5Node, off: usize, buf: &mut [u8]) -> SyscallResult {
    let size = node.with_inode(|inode| inode.size as usize);
    if off >= size {
        return Ok(0);
    }
    let end = size.min(off + buf.len());
    let obj = node.object();
    let mut pos = off;
    while pos < end {
        let pageno = pos / S5_BLOCK_SIZE;
        let page_off = pos % S5_BLOCK_SIZE;
        let chunk = (S5_BLOCK_SIZE - page_off).min(end - pos);
        let frame = obj.get_page(pageno)?;
        buf[pos - off..pos - off + chunk]
            .copy_from_slice(&frame.as_slice()[page_off..page_off + chunk]);
        pos += chunk;
    }
    Ok(end - off)
}

/// Writes `buf` at `off` through the file's pages, extending the length
/// and allocating blocks as needed. Returns the count written.
pub fn write_file(node: &S5Node, off: usize, buf: &[u8]) -> SyscallResult {
    if buf.is_empty() {
        return Ok(0);
    }
    if off + buf.len() > S5_MAX_FILE_SIZE {
        return Err(SysError::EINVAL);
    }
    let obj = node.object();
    let mut pos = off;
    let end = off + buf.len();
    while pos < end {
        let pageno = pos / S5_BLOCK_SIZE;
        let page_off = pos % S5_BLOCK_SIZE;
        let chunk = (S5_BLOCK_SIZE - page_off).min(end - pos);
        let frame = obj.get_page(pageno)?;
        // Reserve the backing block before the bytes land; ENOSPC aborts
        // with the bytes written so far.
        if let Err(err) = frame.mark_dirty() {
            return if pos > off { Ok(pos - off) } else { Err(err) };
        }
        frame.as_mut_slice()[page_off..page_off + chunk]
            .copy_from_slice(&buf[pos - off..pos - off + chunk]);
        pos += chunk;

        let size = node.with_inode(|inode| inode.size as usize);
        if pos > size {
            node.update_inode(|inode| inode.size = pos as u32)?;
            node.set_len(pos);
        }
    }
    Ok(buf.len())
}

/// Linear scan for `name`. Returns the entry's inode and the byte offset
/// of its slot.
pub fn find_dirent(dir: &S5Node, name: &str) -> SysResult<Option<(u32, usize)>> {
    let size = dir.with_inode(|inode| inode.size as usize);
    let mut off = 0;
    let mut bytes = [0u8; S5_DIRENT_SIZE];
    while off < size {
        let read = read_file(dir, off, &mut bytes)?;
        debug_assert_eq!(read, S5_DIRENT_SIZE);
        let ent = S5DirEnt::from_bytes(&bytes);
        if !ent.is_free() && ent.name_matches(name) {
            return Ok(Some((ent.ino, off)));
        }
        off += S5_DIRENT_SIZE;
    }
    Ok(None)
}

/// Writes a directory entry binding `name` to `target`, reusing a free
/// slot or growing the directory, and counts the link on the target. By
/// convention a `"."` entry does not contribute to the link count.
///
/// # Errors
/// `EEXIST` when `name` is already present.
pub fn dir_link(dir: &S5Node, target: &S5Node, name: &str) -> SysResult<()> {
    if find_dirent(dir, name)?.is_some() {
        return Err(SysError::EEXIST);
    }

    // First free slot, or the end of the directory.
    let size = dir.with_inode(|inode| inode.size as usize);
    let mut slot = size;
    let mut off = 0;
    let mut bytes = [0u8; S5_DIRENT_SIZE];
    while off < size {
        read_file(dir, off, &mut bytes)?;
        if S5DirEnt::from_bytes(&bytes).is_free() {
            slot = off;
            break;
        }
        off += S5_DIRENT_SIZE;
    }

    let ent = S5DirEnt::new(target.ino(), name);
    let written = write_file(dir, slot, ent.as_bytes())?;
    if written != S5_DIRENT_SIZE {
        return Err(SysError::ENOSPC);
    }
    if name != "." {
        target.update_inode(|inode| inode.linkcount += 1)?;
    }
    log::debug!("[s5_link] {} -> ino {} in dir {}", name, target.ino(), dir.ino());
    Ok(())
}

/// Removes the entry `name`, freeing its slot and dropping the target's
/// link count. The target inode itself is freed when its last in-memory
/// reference goes away and no links remain.
///
/// # Errors
/// `ENOENT` when no such entry exists.
pub fn dir_unlink(dir: &S5Node, name: &str) -> SysResult<()> {
    let (ino, slot) = find_dirent(dir, name)?.ok_or(SysError::ENOENT)?;
    let free = S5DirEnt::free();
    write_file(dir, slot, free.as_bytes())?;

    if name != "." {
        let fs = dir.fs_dyn();
        let target = vget(&fs, ino)?;
        let target = target
            .downcast_ref::<S5Node>()
            .expect("s5fs vnode of foreign type");
        target.update_inode(|inode| inode.linkcount -= 1)?;
        // vput: the drop below releases the reference taken above.
    }
    log::debug!("[s5_remove_dirent] {} (ino {}) from dir {}", name, ino, dir.ino());
    Ok(())
}

/// Reads the live entry at or after directory offset `off`. Returns the
/// offset advance past the returned entry, or `None` at the end.
pub fn read_dirent(dir: &S5Node, off: usize) -> SysResult<Option<(usize, DirEntry)>> {
    if off % S5_DIRENT_SIZE != 0 {
        return Err(SysError::EINVAL);
    }
    let size = dir.with_inode(|inode| inode.size as usize);
    let mut pos = off;
    let mut bytes = [0u8; S5_DIRENT_SIZE];
    while pos < size {
        read_file(dir, pos, &mut bytes)?;
        pos += S5_DIRENT_SIZE;
        let ent = S5DirEnt::from_bytes(&bytes);
        if ent.is_free() {
            continue;
        }
        // The raw inode gives the type without pulling a vnode in.
        let vtype = match dir.fs().read_inode(ent.ino)?.vtype {
            S5_TYPE_DIR => VnodeType::Dir,
            S5_TYPE_CHR => VnodeType::CharDev,
            S5_TYPE_BLK => VnodeType::BlockDev,
            _ => VnodeType::Regular,
        };
        let entry = DirEntry {
            ino: ent.ino,
            vtype,
            name: alloc::string::String::from(ent.name_str()),
        };
        return Ok(Some((pos - off, entry)));
    }
    Ok(None)
}

//! Disk formatter.
//!
//! Lays down an empty file system: superblock, a free-inode chain, the
//! root directory with `"."` and `".."`, and the chained free-block list
//! over the rest of the device. Runs against the raw device, before any
//! mount.

use alloc::sync::Arc;
use alloc::vec;

use driver::BlockDevice;
use systype::{SysError, SysResult};

use crate::layout::*;

fn put<T>(buf: &mut [u8], off: usize, value: &T) {
    let bytes = unsafe {
        core::slice::from_raw_parts(value as *const T as *const u8, core::mem::size_of::<T>())
    };
    buf[off..off + bytes.len()].copy_from_slice(bytes);
}

/// Formats `dev` with `num_inodes` inodes. The root directory is inode
/// [`S5_ROOT_INO`]; inode 0 is written as permanently free and never
/// chained, because a zero inode number in a directory entry marks the
/// slot free and must not name a real file.
///
/// # Errors
/// `EINVAL` when the device is too small to hold the requested layout,
/// or fewer than two inodes were asked for (the reserved one plus root).
pub fn mkfs(dev: &Arc<dyn BlockDevice>, num_inodes: u32) -> SysResult<()> {
    let total = dev.block_count();
    let inode_blocks = (num_inodes as usize).div_ceil(S5_INODES_PER_BLOCK);
    let root_data = S5_INODE_FIRST_BLOCK + inode_blocks;
    if num_inodes <= S5_ROOT_INO || total <= root_data + 1 {
        return Err(SysError::EINVAL);
    }

    let mut buf = vec![0u8; S5_BLOCK_SIZE];

    // Boot block stays zeroed.
    dev.write_block(0, &buf)?;

    // Inode blocks: inode 0 is reserved, the root directory follows it
    // with its single link coming from its own ".." entry, and the rest
    // form the free chain.
    for block in 0..inode_blocks {
        buf.fill(0);
        for slot in 0..S5_INODES_PER_BLOCK {
            let ino = (block * S5_INODES_PER_BLOCK + slot) as u32;
            if ino >= num_inodes {
                break;
            }
            let inode = if ino == 0 {
                // Free but deliberately off the free list.
                let mut reserved = S5Inode::empty(S5_TYPE_FREE);
                reserved.indirect = S5_FREE_END;
                reserved
            } else if ino == S5_ROOT_INO {
                let mut root = S5Inode::empty(S5_TYPE_DIR);
                root.linkcount = 1;
                root.size = (2 * S5_DIRENT_SIZE) as u32;
                root.direct[0] = root_data as u32;
                root
            } else {
                let mut free = S5Inode::empty(S5_TYPE_FREE);
                free.indirect = if ino + 1 < num_inodes {
                    ino + 1
                } else {
                    S5_FREE_END
                };
                free
            };
            put(&mut buf, slot * S5_INODE_SIZE, &inode);
        }
        dev.write_block(S5_INODE_FIRST_BLOCK + block, &buf)?;
    }

    // Root directory contents.
    buf.fill(0);
    put(&mut buf, 0, &S5DirEnt::new(S5_ROOT_INO, "."));
    put(&mut buf, S5_DIRENT_SIZE, &S5DirEnt::new(S5_ROOT_INO, ".."));
    dev.write_block(root_data, &buf)?;

    // Chain the remaining blocks onto the free list, spilling a batch
    // into a free block whenever the in-super cache fills.
    let mut nfree: u32 = 1;
    let mut free_blocks = [0u32; S5_NBLKS_PER_FNODE];
    for block in (root_data + 1)..total {
        let block = block as u32;
        if nfree as usize == S5_NBLKS_PER_FNODE {
            buf.fill(0);
            put(&mut buf, 0, &nfree);
            put(&mut buf, 4, &free_blocks);
            dev.write_block(block as usize, &buf)?;
            nfree = 1;
            free_blocks[0] = block;
        } else {
            free_blocks[nfree as usize] = block;
            nfree += 1;
        }
    }

    let sb = S5SuperBlock {
        magic: S5_MAGIC,
        version: S5_CURRENT_VERSION,
        num_inodes,
        free_inode: if num_inodes > S5_ROOT_INO + 1 {
            S5_ROOT_INO + 1
        } else {
            S5_FREE_END
        },
        nfree,
        free_blocks,
        root_inode: S5_ROOT_INO,
    };
    buf.fill(0);
    put(&mut buf, 0, &sb);
    dev.write_block(S5_SUPER_BLOCK, &buf)?;

    log::info!(
        "[mkfs] {} blocks, {} inodes, root data block {}",
        total,
        num_inodes,
        root_data
    );
    Ok(())
}

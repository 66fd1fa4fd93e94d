//! Consistency checks run at mount and unmount.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use vfs::{FileSystem, Vnode, vget, vput};

use crate::fs::S5FileSystem;
use crate::layout::*;
use crate::node::S5Node;

/// Structural superblock verification. `true` means plausible.
pub fn check_super(sb: &S5SuperBlock) -> bool {
    if sb.magic != S5_MAGIC {
        return false;
    }
    if sb.version != S5_CURRENT_VERSION {
        log::warn!(
            "[s5fs] file system is version {}; only version {} is supported",
            sb.version,
            S5_CURRENT_VERSION
        );
        return false;
    }
    (sb.free_inode < sb.num_inodes || sb.free_inode == S5_FREE_END)
        // A zero root would collide with the free-dirent sentinel.
        && sb.root_inode != 0
        && sb.root_inode < sb.num_inodes
}

/// Counts the directory entries referring to each inode in the tree
/// reachable from `vnode`. `"."` entries are skipped: by convention they
/// do not contribute to an inode's link count.
fn calculate_refcounts(counts: &mut [i32], vnode: &Arc<dyn Vnode>) {
    let node = vnode.downcast_ref::<S5Node>().expect("own vnode");
    counts[node.ino() as usize] += 1;

    // Only descend on first sight, or cycles through ".." would recurse
    // forever.
    if counts[node.ino() as usize] != 1 || !vnode.vtype().is_dir() {
        return;
    }
    let mut off = 0;
    while let Some((advance, entry)) = vnode.readdir(off).expect("readdir during fsck") {
        if entry.name != "." {
            let child = vget(&node.fs_dyn(), entry.ino).expect("vget during fsck");
            calculate_refcounts(counts, &child);
            vput(child);
        }
        off += advance;
    }
}

/// Walks the tree from the root and compares the observed entry counts
/// with every inode's on-disk link count (less the in-core bias of the
/// vnodes this walk itself keeps live). Returns 0 when consistent.
pub fn check_refcounts(fs: &Arc<S5FileSystem>) -> i32 {
    let num_inodes = fs.with_super(|sb| sb.num_inodes) as usize;
    let mut counts: Vec<i32> = vec![0; num_inodes];

    let fsdyn: Arc<dyn FileSystem> = Arc::clone(fs) as Arc<dyn FileSystem>;
    let root = fsdyn.root().expect("root vnode during fsck");
    calculate_refcounts(&mut counts, &root);
    // The initial call counted the root as if an entry referred to it.
    counts[root.ino() as usize] -= 1;

    let mut ret = 0;
    for (ino, &expected) in counts.iter().enumerate() {
        if expected == 0 {
            continue;
        }
        let vnode = vget(&fsdyn, ino as u32).expect("vget during fsck");
        let node = vnode.downcast_ref::<S5Node>().expect("own vnode");
        let linkcount = node.with_inode(|inode| inode.linkcount as i32);
        if expected != linkcount - 1 {
            log::error!(
                "[s5fs_check_refcounts] inode {ino}: expecting {expected}, found {}",
                linkcount - 1
            );
            ret = -1;
        }
        vput(vnode);
    }
    drop(root);
    ret
}

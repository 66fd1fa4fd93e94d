//! The mounted file system: superblock, free lists, inode slots.

use alloc::string::{String, ToString};
use alloc::sync::Arc;

use config::device::{DISK_MAJOR, DevId, mkdevid};
use driver::BlockDevice;
use mm::mmobj::{BlockObject, MemObject};
use mm::pframe::PageFrame;
use mutex::SleepMutex;
use systype::{SysError, SysResult};
use vfs::{FileSystem, FileSystemMeta, Vnode, vcache};

use crate::fsck;
use crate::layout::*;
use crate::node::S5Node;

pub struct S5FileSystem {
    meta: FileSystemMeta,
    dev: Arc<dyn BlockDevice>,
    /// Metadata page cache: superblock, inode blocks, indirect blocks and
    /// free-list batches all live in the device's pages.
    obj: Arc<BlockObject>,
    /// The per-filesystem mutex, serializing superblock and free-list
    /// mutations. Taken as a leaf: nothing acquires a vnode lock under it.
    lock: SleepMutex<()>,
    /// The superblock's frame, pinned from mount to unmount.
    super_frame: Arc<PageFrame>,
}

/// Layout of a free-block chain batch, stored in a free block.
#[derive(Clone, Copy)]
#[repr(C)]
struct FreeBatch {
    nfree: u32,
    entries: [u32; S5_NBLKS_PER_FNODE],
}

impl S5FileSystem {
    /// Mounts the file system on the device named `"diskN"`.
    ///
    /// # Errors
    /// `EINVAL` for an unparsable name, a missing device, or a superblock
    /// that fails verification.
    pub fn mount(dev_name: &str) -> SysResult<Arc<Self>> {
        let minor: u16 = dev_name
            .strip_prefix("disk")
            .and_then(|n| n.parse().ok())
            .ok_or(SysError::EINVAL)?;
        let dev = driver::lookup_block_device(mkdevid(DISK_MAJOR, minor)).ok_or(SysError::EINVAL)?;
        Self::mount_device(dev_name.to_string(), dev)
    }

    fn mount_device(dev_name: String, dev: Arc<dyn BlockDevice>) -> SysResult<Arc<Self>> {
        let obj = BlockObject::new(Arc::clone(&dev));
        let objdyn: Arc<dyn MemObject> = obj.clone();
        let super_frame = objdyn.get_page(S5_SUPER_BLOCK)?;

        let sb = unsafe { &*(super_frame.kernel_addr() as *const S5SuperBlock) };
        if !fsck::check_super(sb) {
            log::warn!("[s5fs] bad superblock on {dev_name}");
            return Err(SysError::EINVAL);
        }
        super_frame.pin();

        let fs = Arc::new(Self {
            meta: FileSystemMeta::new(dev_name, sb.root_inode),
            dev,
            obj,
            lock: SleepMutex::new(()),
            super_frame,
        });
        log::info!(
            "[s5fs] mounted {}: {} inodes, root inode {}",
            fs.meta.dev_name,
            fs.with_super(|sb| sb.num_inodes),
            fs.meta.root_ino
        );
        Ok(fs)
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.dev
    }

    pub(crate) fn obj(&self) -> Arc<dyn MemObject> {
        self.obj.clone()
    }

    /// Runs `f` against the resident superblock. Mutators hold the fs
    /// lock and dirty the frame afterwards.
    pub(crate) fn with_super<R>(&self, f: impl FnOnce(&mut S5SuperBlock) -> R) -> R {
        let sb = unsafe { &mut *(self.super_frame.kernel_addr() as *mut S5SuperBlock) };
        f(sb)
    }

    fn dirty_super(&self) -> SysResult<()> {
        self.super_frame.mark_dirty()
    }

    pub(crate) fn read_inode(&self, ino: u32) -> SysResult<S5Inode> {
        let frame = self.obj().get_page(inode_block(ino))?;
        let bytes = &frame.as_slice()[inode_offset(ino)..inode_offset(ino) + S5_INODE_SIZE];
        Ok(unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const S5Inode) })
    }

    pub(crate) fn write_inode(&self, ino: u32, inode: &S5Inode) -> SysResult<()> {
        let frame = self.obj().get_page(inode_block(ino))?;
        let bytes = unsafe {
            core::slice::from_raw_parts(inode as *const S5Inode as *const u8, S5_INODE_SIZE)
        };
        frame.as_mut_slice()[inode_offset(ino)..inode_offset(ino) + S5_INODE_SIZE]
            .copy_from_slice(bytes);
        frame.mark_dirty()
    }

    /// Takes a data block off the free chain.
    ///
    /// # Errors
    /// `ENOSPC` when the chain is exhausted.
    pub(crate) fn alloc_block(&self) -> SysResult<u32> {
        let _guard = self.lock.lock();
        self.alloc_block_locked()
    }

    fn alloc_block_locked(&self) -> SysResult<u32> {
        let (block, need_refill) = self.with_super(|sb| {
            if sb.nfree > 1 {
                sb.nfree -= 1;
                (sb.free_blocks[sb.nfree as usize], false)
            } else {
                (sb.free_blocks[0], true)
            }
        });
        if !need_refill {
            self.dirty_super()?;
            return Ok(block);
        }
        if block == 0 {
            return Err(SysError::ENOSPC);
        }
        // The link block holds the next batch; consuming the batch turns
        // the link block itself into the allocated one.
        let frame = self.obj().get_page(block as usize)?;
        let batch = unsafe { &*(frame.kernel_addr() as *const FreeBatch) };
        self.with_super(|sb| {
            sb.nfree = batch.nfree;
            sb.free_blocks = batch.entries;
        });
        self.dirty_super()?;
        Ok(block)
    }

    /// Puts a data block back on the free chain.
    pub(crate) fn free_block(&self, block: u32) -> SysResult<()> {
        let _guard = self.lock.lock();
        self.free_block_locked(block)
    }

    fn free_block_locked(&self, block: u32) -> SysResult<()> {
        debug_assert!(block != 0);
        let spill = self.with_super(|sb| sb.nfree as usize == S5_NBLKS_PER_FNODE);
        if spill {
            // Cache full: the freed block becomes the next chain batch.
            let frame = self.obj().get_page(block as usize)?;
            self.with_super(|sb| {
                let batch = unsafe { &mut *(frame.kernel_addr() as *mut FreeBatch) };
                batch.nfree = sb.nfree;
                batch.entries = sb.free_blocks;
                sb.nfree = 1;
                sb.free_blocks[0] = block;
            });
            frame.mark_dirty()?;
        } else {
            self.with_super(|sb| {
                sb.free_blocks[sb.nfree as usize] = block;
                sb.nfree += 1;
            });
        }
        self.dirty_super()
    }

    /// Pops an inode off the free-inode list and initializes it.
    ///
    /// Device types keep `devid` in the indirect slot.
    ///
    /// # Errors
    /// `ENOSPC` when no free inodes remain.
    pub(crate) fn alloc_inode(&self, vtype: u16, devid: DevId) -> SysResult<u32> {
        let _guard = self.lock.lock();
        let head = self.with_super(|sb| sb.free_inode);
        if head == S5_FREE_END {
            return Err(SysError::ENOSPC);
        }
        // Inode 0 is the free-dirent sentinel and is never on the list.
        debug_assert_ne!(head, 0);
        let free = self.read_inode(head)?;
        debug_assert_eq!(free.vtype, S5_TYPE_FREE);
        self.with_super(|sb| sb.free_inode = free.indirect);
        self.dirty_super()?;

        let mut inode = S5Inode::empty(vtype);
        if vtype == S5_TYPE_CHR || vtype == S5_TYPE_BLK {
            inode.indirect = devid;
        }
        self.write_inode(head, &inode)?;
        log::debug!("[s5_alloc_inode] ino {head} type {vtype}");
        Ok(head)
    }

    /// Frees `ino`: returns its data blocks to the free chain, then pushes
    /// the inode onto the free-inode list.
    pub(crate) fn free_inode(&self, ino: u32, inode: &S5Inode) -> SysResult<()> {
        let _guard = self.lock.lock();
        if inode.vtype == S5_TYPE_DATA || inode.vtype == S5_TYPE_DIR {
            for &block in inode.direct.iter().filter(|&&b| b != 0) {
                self.free_block_locked(block)?;
            }
            if inode.indirect != 0 {
                let frame = self.obj().get_page(inode.indirect as usize)?;
                for slot in 0..S5_NIDIRECT {
                    let block = unsafe { *(frame.kernel_addr() as *const u32).add(slot) };
                    if block != 0 {
                        self.free_block_locked(block)?;
                    }
                }
                self.free_block_locked(inode.indirect)?;
            }
        }

        let next = self.with_super(|sb| {
            let next = sb.free_inode;
            sb.free_inode = ino;
            next
        });
        self.dirty_super()?;
        let mut freed = S5Inode::empty(S5_TYPE_FREE);
        freed.indirect = next;
        self.write_inode(ino, &freed)?;
        log::debug!("[s5_free_inode] ino {ino}");
        Ok(())
    }
}

impl FileSystem for S5FileSystem {
    fn meta(&self) -> &FileSystemMeta {
        &self.meta
    }

    fn read_vnode(self: Arc<Self>, ino: u32) -> SysResult<Arc<dyn Vnode>> {
        S5Node::load(&self, ino)
    }

    fn delete_vnode(&self, vnode: &dyn Vnode) {
        let node = vnode
            .downcast_ref::<S5Node>()
            .expect("s5fs vnode of foreign type");
        node.teardown(self);
    }

    fn query_vnode(&self, vnode: &dyn Vnode) -> bool {
        let node = vnode
            .downcast_ref::<S5Node>()
            .expect("s5fs vnode of foreign type");
        // One count is the VFS reference; more means on-disk links remain.
        node.with_inode(|inode| inode.linkcount > 1)
    }

    fn sync(&self) -> SysResult<()> {
        self.obj().flush()
    }

    fn unmount(self: Arc<Self>) -> SysResult<()> {
        let live = vcache::live_count(self.meta.id());
        if live != 0 {
            log::warn!("[s5fs] unmount of {} with {live} live vnodes", self.meta.dev_name);
            return Err(SysError::EBUSY);
        }
        if fsck::check_refcounts(&self) != 0 {
            panic!(
                "s5fs: link-count corruption discovered on {} at unmount",
                self.meta.dev_name
            );
        }
        let sane = self.with_super(|sb| fsck::check_super(sb));
        if !sane {
            panic!(
                "s5fs: corrupted superblock discovered on {} at unmount",
                self.meta.dev_name
            );
        }
        self.sync()?;
        self.super_frame.unpin();
        self.super_frame.clean()?;
        log::info!("[s5fs] unmounted {}", self.meta.dev_name);
        Ok(())
    }
}

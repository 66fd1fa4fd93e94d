//! S5FS tests, run against a second ram disk so unmount and remount can
//! be exercised without touching the root file system.

use alloc::sync::Arc;
use alloc::vec;

use config::device::{DISK_MAJOR, mkdevid};
use config::inode::VnodeType;
use driver::{BlockDevice, RamDisk};
use mm::mmobj::MemObject;
use s5fs::{S5FileSystem, S5_BLOCK_SIZE, S5_NAME_LEN, mkfs};
use systype::SysError;
use vfs::{FileSystem, Vnode, vget, vput};

const TEST_DISK_BLOCKS: usize = 1024;
const TEST_INODES: u32 = 128;

fn mount_test_disk() -> Arc<S5FileSystem> {
    S5FileSystem::mount("disk1").expect("mount disk1")
}

pub fn run() {
    let disk: Arc<dyn BlockDevice> =
        Arc::new(RamDisk::new(mkdevid(DISK_MAJOR, 1), TEST_DISK_BLOCKS));
    driver::register_block_device(Arc::clone(&disk));
    mkfs(&disk, TEST_INODES).expect("mkfs disk1");

    roundtrip_test();
    sparse_test();
    vnode_identity_test();
    dir_linkcount_test();
    link_unlink_test();
    readdir_test();
    error_wall_test();
    shared_page_test();
    remount_test();
}

fn readdir_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    root.mkdir("list_me").unwrap();
    let dir = root.lookup("list_me").unwrap();
    dir.create("alpha").unwrap();
    dir.create("beta").unwrap();

    let mut names = alloc::vec::Vec::new();
    let mut off = 0;
    while let Some((advance, entry)) = dir.readdir(off).unwrap() {
        names.push(entry.name.clone());
        off += advance;
    }
    assert_eq!(names, [".", "..", "alpha", "beta"]);

    // Freed slots are skipped, not returned.
    dir.unlink("alpha").unwrap();
    let mut names = alloc::vec::Vec::new();
    let mut off = 0;
    while let Some((advance, entry)) = dir.readdir(off).unwrap() {
        names.push(entry.name.clone());
        off += advance;
    }
    assert_eq!(names, [".", "..", "beta"]);
    // A new entry reuses the freed slot.
    dir.create("gamma").unwrap();
    assert!(matches!(dir.readdir(5), Err(SysError::EINVAL)));

    dir.unlink("beta").unwrap();
    dir.unlink("gamma").unwrap();
    vput(dir);
    root.rmdir("list_me").unwrap();
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 readdir_test pass");
}

/// Bytes written come back identical, within one mount.
fn roundtrip_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    let file = root.create("roundtrip").unwrap();
    let data = b"the quick brown fox jumps over the lazy dog";
    assert_eq!(file.write_at(0, data).unwrap(), data.len());
    // Rewrite in the middle, crossing nothing fancy.
    assert_eq!(file.write_at(4, b"slow").unwrap(), 4);

    let mut readback = vec![0u8; data.len()];
    assert_eq!(file.read_at(0, &mut readback).unwrap(), data.len());
    assert_eq!(&readback[..4], b"the ");
    assert_eq!(&readback[4..8], b"slow");
    assert_eq!(&readback[8..], &data[8..]);

    // Reads past the end return 0.
    assert_eq!(file.read_at(data.len() * 2, &mut readback).unwrap(), 0);

    root.unlink("roundtrip").unwrap();
    vput(file);
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 roundtrip_test pass");
}

/// The sparse-growth scenario: a write far into a fresh file reads back
/// as zeros up to the written bytes, and costs at most a data block plus
/// an indirect block.
fn sparse_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    let file = root.create("sparse").unwrap();
    let off = 8 * S5_BLOCK_SIZE;
    assert_eq!(file.write_at(off, b"hi").unwrap(), 2);
    assert_eq!(file.len(), off + 2);

    let stat = file.stat().unwrap();
    assert_eq!(stat.st_size, off + 2);
    assert!(stat.st_blocks <= 2, "sparse file grew {} blocks", stat.st_blocks);

    let mut readback = vec![0xffu8; off + 2];
    assert_eq!(file.read_at(0, &mut readback).unwrap(), off + 2);
    assert!(readback[..off].iter().all(|&b| b == 0));
    assert_eq!(&readback[off..], b"hi");

    root.unlink("sparse").unwrap();
    vput(file);
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 sparse_test pass");
}

/// At most one vnode per (fs, ino), and it is the one `vget` returns.
fn vnode_identity_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    let file = root.create("identity").unwrap();
    let ino = file.ino();
    let again = vget(&fsdyn, ino).unwrap();
    assert!(Arc::ptr_eq(&file, &again));
    let through_lookup = root.lookup("identity").unwrap();
    assert!(Arc::ptr_eq(&file, &through_lookup));

    vput(again);
    vput(through_lookup);
    root.unlink("identity").unwrap();
    vput(file);
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 vnode_identity_test pass");
}

/// The directory link-count law across mkdir and rmdir.
fn dir_linkcount_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    let root_links = root.stat().unwrap().st_nlink;

    root.mkdir("a").unwrap();
    // The new ".." entry in /a links the root once more.
    assert_eq!(root.stat().unwrap().st_nlink, root_links + 1);

    let a = root.lookup("a").unwrap();
    // Parent entry plus the live-vnode reference; "." does not count.
    assert_eq!(a.stat().unwrap().st_nlink, 2);

    a.mkdir("b").unwrap();
    assert_eq!(a.stat().unwrap().st_nlink, 3);
    let b = a.lookup("b").unwrap();
    assert_eq!(b.stat().unwrap().st_nlink, 2);
    vput(b);

    a.rmdir("b").unwrap();
    assert_eq!(a.stat().unwrap().st_nlink, 2);
    assert!(matches!(a.lookup("b"), Err(SysError::ENOENT)));

    root.rmdir("a").unwrap();
    assert_eq!(root.stat().unwrap().st_nlink, root_links);
    assert!(matches!(root.lookup("a"), Err(SysError::ENOENT)));

    vput(a);
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 dir_linkcount_test pass");
}

fn link_unlink_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    let file = root.create("first").unwrap();
    file.write_at(0, b"payload").unwrap();
    root.link(&file, "second").unwrap();
    // Two entries plus the live reference.
    assert_eq!(file.stat().unwrap().st_nlink, 3);

    root.unlink("first").unwrap();
    assert_eq!(file.stat().unwrap().st_nlink, 2);
    assert!(matches!(root.lookup("first"), Err(SysError::ENOENT)));

    let second = root.lookup("second").unwrap();
    assert!(Arc::ptr_eq(&file, &second));
    let mut readback = [0u8; 7];
    second.read_at(0, &mut readback).unwrap();
    assert_eq!(&readback, b"payload");
    vput(second);

    root.unlink("second").unwrap();
    vput(file);
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 link_unlink_test pass");
}

fn error_wall_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    assert!(matches!(root.lookup("missing"), Err(SysError::ENOENT)));

    root.mkdir("dir").unwrap();
    assert!(matches!(root.mkdir("dir"), Err(SysError::EEXIST)));
    let dir = root.lookup("dir").unwrap();
    assert!(matches!(root.unlink("dir"), Err(SysError::EPERM)));

    dir.create("occupant").unwrap();
    assert!(matches!(root.rmdir("dir"), Err(SysError::ENOTEMPTY)));
    assert!(matches!(dir.rmdir("."), Err(SysError::EINVAL)));
    assert!(matches!(dir.rmdir(".."), Err(SysError::ENOTEMPTY)));

    // Data ops on a directory, directory ops on a file.
    let mut buf = [0u8; 8];
    assert!(matches!(dir.read_at(0, &mut buf), Err(SysError::EISDIR)));
    let occupant = dir.lookup("occupant").unwrap();
    assert!(matches!(occupant.lookup("x"), Err(SysError::ENOTDIR)));
    assert!(matches!(occupant.mkdir("x"), Err(SysError::ENOTDIR)));

    // Name-length policing happens in the path layer.
    let long = "x".repeat(S5_NAME_LEN + 1);
    assert!(matches!(
        vfs::path::namev(&long, Some(Arc::clone(&root))),
        Err(SysError::ENAMETOOLONG)
    ));

    vput(occupant);
    dir.unlink("occupant").unwrap();
    vput(dir);
    root.rmdir("dir").unwrap();
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 error_wall_test pass");
}

/// The shared-mapping visibility scenario at the object layer: two
/// shared views of one file resolve to the same page frame, and a write
/// through one is readable through the other and, after write-back,
/// through the file system.
fn shared_page_test() {
    let fs = mount_test_disk();
    let fsdyn: Arc<dyn FileSystem> = fs.clone();
    let root = fsdyn.root().unwrap();

    let file = root.create("shared").unwrap();
    file.write_at(0, b"before").unwrap();

    // Two mappings of the same file share the vnode's object.
    let view_a = file.object();
    let view_b = file.object();
    assert!(Arc::ptr_eq(&view_a, &view_b));

    let frame_a = view_a.lookup_page(0, true).unwrap();
    frame_a.mark_dirty().unwrap();
    frame_a.as_mut_slice()[..5].copy_from_slice(b"after");

    let frame_b = view_b.lookup_page(0, false).unwrap();
    assert!(Arc::ptr_eq(&frame_a, &frame_b));
    assert_eq!(&frame_b.as_slice()[..6], b"aftere");

    // After write-back the bytes are on disk for the read path.
    frame_a.clean().unwrap();
    let mut readback = [0u8; 6];
    file.read_at(0, &mut readback).unwrap();
    assert_eq!(&readback, b"aftere");

    root.unlink("shared").unwrap();
    vput(file);
    vput(root);
    fs.unmount().unwrap();
    log::info!("[ktest] s5 shared_page_test pass");
}

/// The remount-integrity scenario: a tree written before unmount reads
/// back identically after remount, and the unmount-time reference-count
/// walk stays clean throughout.
fn remount_test() {
    {
        let fs = mount_test_disk();
        let fsdyn: Arc<dyn FileSystem> = fs.clone();
        let root = fsdyn.root().unwrap();

        root.mkdir("d1").unwrap();
        let d1 = root.lookup("d1").unwrap();
        let f1 = d1.create("f1").unwrap();
        f1.write_at(0, b"hello").unwrap();
        d1.mkdir("d2").unwrap();
        let d2 = d1.lookup("d2").unwrap();
        let f2 = d2.create("f2").unwrap();
        f2.write_at(0, b"world").unwrap();

        vput(f2);
        vput(d2);
        vput(f1);
        vput(d1);
        vput(root);
        // unmount re-checks refcounts and the superblock, and flushes.
        fs.unmount().unwrap();
    }

    {
        let fs = mount_test_disk();
        let fsdyn: Arc<dyn FileSystem> = fs.clone();
        let root = fsdyn.root().unwrap();

        let d1 = root.lookup("d1").unwrap();
        assert_eq!(d1.vtype(), VnodeType::Dir);
        let f1 = d1.lookup("f1").unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(f1.read_at(0, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");

        let d2 = d1.lookup("d2").unwrap();
        let f2 = d2.lookup("f2").unwrap();
        assert_eq!(f2.read_at(0, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");

        // Clean the tree up so later tests see a predictable disk.
        vput(f2);
        d2.unlink("f2").unwrap();
        vput(d2);
        d1.rmdir("d2").unwrap();
        vput(f1);
        d1.unlink("f1").unwrap();
        vput(d1);
        root.rmdir("d1").unwrap();
        vput(root);
        fs.unmount().unwrap();
    }
    log::info!("[ktest] s5 remount_test pass");
}

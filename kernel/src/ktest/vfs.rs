//! VFS tests driven through the syscall layer, using the init process's
//! descriptor table and the root file system.

use alloc::vec::Vec;

use config::vfs::{NFILES, OpenFlags};
use systype::SysError;

use crate::processor::current_process;
use crate::syscall::fs::{
    do_close, do_dup, do_lseek, do_mkdir, do_open, do_readdir, do_rmdir, do_stat, do_unlink,
};

fn creat_rdwr() -> u32 {
    (OpenFlags::O_CREAT | OpenFlags::O_RDWR).bits()
}

pub fn open_test() {
    let proc = current_process();

    // Create, write, reopen read-only, read back.
    let fd = do_open("/ktest_open", creat_rdwr()).unwrap();
    let file = proc.get_file(fd).unwrap();
    assert_eq!(file.write(b"abcdef").unwrap(), 6);
    do_close(fd).unwrap();

    let fd = do_open("/ktest_open", 0).unwrap();
    let file = proc.get_file(fd).unwrap();
    let mut buf = [0u8; 6];
    assert_eq!(file.read(&mut buf).unwrap(), 6);
    assert_eq!(&buf, b"abcdef");
    // Write through a read-only description is refused.
    assert!(matches!(file.write(b"x"), Err(SysError::EBADF)));
    do_close(fd).unwrap();

    // The error wall.
    assert!(matches!(do_open("/ktest_missing", 0), Err(SysError::ENOENT)));
    assert!(matches!(do_open("/ktest_open", 0o3), Err(SysError::EINVAL)));
    assert!(matches!(
        do_open("/dev", OpenFlags::O_WRONLY.bits()),
        Err(SysError::EISDIR)
    ));
    assert!(matches!(do_close(NFILES + 1), Err(SysError::EBADF)));
    assert!(matches!(do_close(77), Err(SysError::EBADF)));

    // Append mode positions every write at the end.
    let fd = do_open("/ktest_open", (OpenFlags::O_WRONLY | OpenFlags::O_APPEND).bits()).unwrap();
    let file = proc.get_file(fd).unwrap();
    file.write(b"gh").unwrap();
    do_close(fd).unwrap();
    let stat = do_stat("/ktest_open").unwrap();
    assert_eq!(stat.st_size, 8);

    do_unlink("/ktest_open").unwrap();
    assert!(matches!(do_stat("/ktest_open"), Err(SysError::ENOENT)));

    log::info!("[ktest] open_test pass");
}

pub fn dup_and_seek_test() {
    let proc = current_process();
    let fd = do_open("/ktest_dup", creat_rdwr()).unwrap();
    let file = proc.get_file(fd).unwrap();
    file.write(b"0123456789").unwrap();

    // A dup shares the open-file description, offset included.
    let fd2 = do_dup(fd).unwrap();
    assert_ne!(fd, fd2);
    assert!(core::ptr::eq(
        alloc::sync::Arc::as_ptr(&proc.get_file(fd).unwrap()),
        alloc::sync::Arc::as_ptr(&proc.get_file(fd2).unwrap()),
    ));

    do_lseek(fd, 4, 0).unwrap();
    let mut buf = [0u8; 2];
    proc.get_file(fd2).unwrap().read(&mut buf).unwrap();
    assert_eq!(&buf, b"45");

    // Seeking from the end and from the current position.
    assert_eq!(do_lseek(fd, -2, 2).unwrap(), 8);
    assert_eq!(do_lseek(fd, 1, 1).unwrap(), 9);
    assert!(matches!(do_lseek(fd, -100, 1), Err(SysError::EINVAL)));
    assert!(matches!(do_lseek(fd, 0, 9), Err(SysError::EINVAL)));

    do_close(fd).unwrap();
    do_close(fd2).unwrap();
    do_unlink("/ktest_dup").unwrap();
    log::info!("[ktest] dup_and_seek_test pass");
}

pub fn fd_exhaustion_test() {
    let mut opened = Vec::new();
    loop {
        match do_open("/", 0) {
            Ok(fd) => opened.push(fd),
            Err(SysError::EMFILE) => break,
            Err(err) => panic!("unexpected open error {err:?}"),
        }
    }
    // 0/1/2 are the console.
    assert_eq!(opened.len(), NFILES - 3);
    for fd in opened {
        do_close(fd).unwrap();
    }
    log::info!("[ktest] fd_exhaustion_test pass");
}

/// Directory syscalls over paths, including multi-component walks.
pub fn mkdir_tree_test() {
    do_mkdir("/ktree").unwrap();
    do_mkdir("/ktree/sub").unwrap();
    assert!(matches!(do_mkdir("/ktree/sub"), Err(SysError::EEXIST)));
    assert!(matches!(do_mkdir("/ktree/none/deep"), Err(SysError::ENOENT)));
    assert!(matches!(do_rmdir("/ktree"), Err(SysError::ENOTEMPTY)));

    // Listing through an open directory descriptor.
    let fd = do_open("/ktree", 0).unwrap();
    let mut names = Vec::new();
    while let Some(entry) = do_readdir(fd).unwrap() {
        names.push(entry.name);
    }
    assert_eq!(names, [".", "..", "sub"]);
    assert!(matches!(do_readdir(fd + 9), Err(SysError::EBADF)));
    do_close(fd).unwrap();

    do_rmdir("/ktree/sub").unwrap();
    do_rmdir("/ktree").unwrap();
    assert!(matches!(do_stat("/ktree"), Err(SysError::ENOENT)));
    log::info!("[ktest] mkdir_tree_test pass");
}

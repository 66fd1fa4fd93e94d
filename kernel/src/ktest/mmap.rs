//! mmap/munmap tests. These run as the init process on its own page
//! directory, so touching a mapped address takes the real fault path
//! through the trap handler.

use config::mm::{PAGE_SIZE, USER_END};
use config::vfs::OpenFlags;
use systype::SysError;

use crate::syscall::fs::{do_close, do_open, do_unlink};
use crate::syscall::mm::{do_mmap, do_munmap};
use crate::vm::flags::{MmapFlags, MmapProt};

const PROT_RW: u32 = MmapProt::PROT_READ.union(MmapProt::PROT_WRITE).bits();
const PROT_R: u32 = MmapProt::PROT_READ.bits();

fn anon_flags(sharing: MmapFlags) -> u32 {
    (sharing | MmapFlags::MAP_ANON).bits()
}

pub fn mmap_error_wall_test() {
    // Length not page-aligned.
    assert!(matches!(
        do_mmap(0, 1, PROT_R, anon_flags(MmapFlags::MAP_SHARED), -1, 0),
        Err(SysError::EINVAL)
    ));
    // Zero length.
    assert!(matches!(
        do_mmap(0, 0, PROT_R, anon_flags(MmapFlags::MAP_SHARED), -1, 0),
        Err(SysError::EINVAL)
    ));
    // Hint misaligned, and hint outside the user window.
    assert!(matches!(
        do_mmap(
            USER_END - PAGE_SIZE + 1,
            PAGE_SIZE,
            PROT_R,
            anon_flags(MmapFlags::MAP_SHARED),
            -1,
            0
        ),
        Err(SysError::EINVAL)
    ));
    assert!(matches!(
        do_mmap(USER_END, PAGE_SIZE, PROT_R, anon_flags(MmapFlags::MAP_SHARED), -1, 0),
        Err(SysError::EINVAL)
    ));
    // Both sharing flags, and neither.
    assert!(matches!(
        do_mmap(
            0,
            PAGE_SIZE,
            PROT_R,
            anon_flags(MmapFlags::MAP_SHARED | MmapFlags::MAP_PRIVATE),
            -1,
            0
        ),
        Err(SysError::EINVAL)
    ));
    assert!(matches!(
        do_mmap(0, PAGE_SIZE, PROT_R, MmapFlags::MAP_ANON.bits(), -1, 0),
        Err(SysError::EINVAL)
    ));
    // File mapping without a file.
    assert!(matches!(
        do_mmap(0, PAGE_SIZE, PROT_R, MmapFlags::MAP_SHARED.bits(), -1, 0),
        Err(SysError::EBADF)
    ));
    assert!(matches!(
        do_mmap(0, PAGE_SIZE, PROT_R, MmapFlags::MAP_SHARED.bits(), 77, 0),
        Err(SysError::EBADF)
    ));

    // Shared writable mapping of a read-only open.
    let fd = do_open("/ktest_mmap_ro", (OpenFlags::O_CREAT | OpenFlags::O_RDWR).bits()).unwrap();
    do_close(fd).unwrap();
    let fd = do_open("/ktest_mmap_ro", 0).unwrap();
    assert!(matches!(
        do_mmap(0, PAGE_SIZE, PROT_RW, MmapFlags::MAP_SHARED.bits(), fd as isize, 0),
        Err(SysError::EACCES)
    ));
    do_close(fd).unwrap();
    do_unlink("/ktest_mmap_ro").unwrap();

    log::info!("[ktest] mmap_error_wall_test pass");
}

/// Maps a file twice shared and once private, and checks visibility by
/// really touching the mappings.
pub fn mmap_file_test() {
    let fd = do_open("/ktest_mmap", (OpenFlags::O_CREAT | OpenFlags::O_RDWR).bits()).unwrap();
    let file = crate::processor::current_process().get_file(fd).unwrap();
    file.write(b"mmap test page").unwrap();

    let a = do_mmap(0, PAGE_SIZE, PROT_RW, MmapFlags::MAP_SHARED.bits(), fd as isize, 0).unwrap();
    let b = do_mmap(0, PAGE_SIZE, PROT_RW, MmapFlags::MAP_SHARED.bits(), fd as isize, 0).unwrap();
    let c = do_mmap(0, PAGE_SIZE, PROT_RW, MmapFlags::MAP_PRIVATE.bits(), fd as isize, 0).unwrap();
    assert_ne!(a, b);

    unsafe {
        // Demand paging: the first read faults the page in.
        assert_eq!(*(a as *const u8), b'm');
        // A store through one shared view is readable through the other.
        *(a as *mut u8) = b'M';
        assert_eq!(*(b as *const u8), b'M');
        // The private view reads through to the shared page until its
        // first write, which splits it off.
        assert_eq!(*(c as *const u8), b'M');
        *(c as *mut u8) = b'Z';
        assert_eq!(*(c as *const u8), b'Z');
        assert_eq!(*(a as *const u8), b'M');
    }

    // The shared write reaches the file's pages.
    let mut buf = [0u8; 4];
    assert_eq!(file.seek(config::vfs::SeekFrom::Start(0)).unwrap(), 0);
    file.read(&mut buf).unwrap();
    assert_eq!(&buf, b"Mmap");

    do_munmap(a, PAGE_SIZE).unwrap();
    do_munmap(b, PAGE_SIZE).unwrap();
    do_munmap(c, PAGE_SIZE).unwrap();
    do_close(fd).unwrap();
    do_unlink("/ktest_mmap").unwrap();
    log::info!("[ktest] mmap_file_test pass");
}

pub fn munmap_idempotence_test() {
    let addr = do_mmap(
        0,
        4 * PAGE_SIZE,
        PROT_RW,
        anon_flags(MmapFlags::MAP_PRIVATE),
        -1,
        0,
    )
    .unwrap();
    unsafe {
        *(addr as *mut u8) = 7;
        assert_eq!(*(addr as *const u8), 7);
    }

    do_munmap(addr, 4 * PAGE_SIZE).unwrap();
    // Unmapping the same (now empty) range again succeeds.
    do_munmap(addr, 4 * PAGE_SIZE).unwrap();
    // As does a partial overlap with nothing mapped.
    do_munmap(addr + PAGE_SIZE, PAGE_SIZE).unwrap();

    // Alignment and range checks still apply.
    assert!(matches!(do_munmap(addr + 1, PAGE_SIZE), Err(SysError::EINVAL)));
    assert!(matches!(do_munmap(addr, 0), Err(SysError::EINVAL)));

    log::info!("[ktest] munmap_idempotence_test pass");
}

#![no_std]
#![no_main]
#![feature(sync_unsafe_cell)]

extern crate alloc;

mod boot;
mod console;
mod ktest;
mod lang_item;
mod logging;
mod proc;
mod processor;
mod sched;
mod syscall;
mod trap;
mod vm;

use core::arch::global_asm;

use alloc::sync::Arc;

use config::device::{DISK_MAJOR, TTY_MAJOR, mkdevid};
use config::inode::VnodeType;
use config::vfs::OpenFlags;
use driver::RamDisk;
use vfs::Vnode as _;

global_asm!(include_str!("entry.S"));

/// Blocks on the root ram disk; enough for the root tree and the tests.
const ROOT_DISK_BLOCKS: usize = 2048;
const ROOT_INODES: u32 = 256;

#[unsafe(no_mangle)]
pub extern "C" fn rust_main(mbi_phys: usize) -> ! {
    logger::init();
    console::init();
    log::info!("minnow booting, multiboot info at {mbi_phys:#x}");

    unsafe {
        mm::heap::init_heap_allocator();
        mm::frame::init_frame_allocator(boot::memory_end(mbi_phys));
        arch::gdt::init();
        arch::trap::init(trap::dispatch);
    }
    arch::interrupt::mask_pic();
    vm::page_table::record_kernel_page_dir();

    sched::init();
    proc::init();

    // The root disk. A freshly formatted ram disk stands in for real
    // storage; the tests bring their own second disk.
    let disk: Arc<dyn driver::BlockDevice> =
        Arc::new(RamDisk::new(mkdevid(DISK_MAJOR, 0), ROOT_DISK_BLOCKS));
    driver::register_block_device(Arc::clone(&disk));
    driver::register_char_device(Arc::new(console::Tty::new(mkdevid(TTY_MAJOR, 0))));
    s5fs::mkfs(&disk, ROOT_INODES).expect("mkfs of root disk");

    let fs = s5fs::S5FileSystem::mount("disk0").expect("mount of root disk");
    vfs::mount::mount_root(fs);

    init_root_tree();

    if option_env!("KTEST").is_some() {
        ktest::run_all();
    }

    log::info!("minnow idle");
    loop {
        sched::yield_now();
        arch::interrupt::wait_for_interrupt();
    }
}

/// `/dev` with the console device, and descriptors 0/1/2 of the first
/// process opened onto it.
fn init_root_tree() {
    let root = vfs::mount::root_vnode().expect("root vnode");
    root.mkdir("dev").expect("mkdir /dev");
    let dev = root.lookup("dev").expect("lookup /dev");
    dev.mknod("tty0", VnodeType::CharDev, mkdevid(TTY_MAJOR, 0))
        .expect("mknod /dev/tty0");
    vfs::vput(dev);
    vfs::vput(root);

    for fd in 0..3 {
        let opened = syscall::fs::do_open("/dev/tty0", OpenFlags::O_RDWR.bits())
            .expect("open /dev/tty0");
        assert_eq!(opened, fd);
    }
}

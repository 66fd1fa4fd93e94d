//! In-kernel test suite, run from the init thread when the image was
//! built with `KTEST` set. Each test panics on failure.

mod fork;
mod mmap;
mod s5;
mod sched;
mod vfs;
mod vm;

pub fn run_all() {
    log::info!("[ktest] begin");

    mm::frame::frame_alloc_test();

    sched::sleep_lock_test();
    sched::file_interleave_test();

    vm::vmmap_test();
    vm::vmmap_remove_test();
    vm::shadow_chain_test();
    vm::pframe_pin_test();
    vm::cow_fork_test();

    vfs::open_test();
    vfs::dup_and_seek_test();
    vfs::fd_exhaustion_test();
    vfs::mkdir_tree_test();

    s5::run();

    mmap::mmap_error_wall_test();
    mmap::mmap_file_test();
    mmap::munmap_idempotence_test();

    fork::fork_test();

    log::info!("[ktest] all tests passed");
}

//! Processes: pid, name, file table, cwd, address space, threads.

pub mod fork;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use config::process::INIT_PID;
use config::vfs::NFILES;
use id_allocator::IdAllocator;
use mutex::{SleepMutex, SleepMutexGuard, SpinNoIrqLock, WaitQueue};
use systype::{SysError, SysResult};
use vfs::{File, Vnode};

use crate::processor::{current_process, current_thread};
use crate::sched::{self, KThread};
use crate::vm::VmSpace;

static PID_ALLOCATOR: SpinNoIrqLock<IdAllocator> =
    SpinNoIrqLock::new(IdAllocator::starting_at(INIT_PID));

static PROC_TABLE: SpinNoIrqLock<BTreeMap<usize, Arc<Process>>> =
    SpinNoIrqLock::new(BTreeMap::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcState {
    Live,
    Zombie(i32),
}

pub struct Process {
    pid: usize,
    name: SpinNoIrqLock<String>,
    parent: SpinNoIrqLock<Option<Weak<Process>>>,
    children: SpinNoIrqLock<Vec<Arc<Process>>>,
    state: SpinNoIrqLock<ProcState>,
    /// The address space. A sleep lock: fault handling does I/O under it.
    vm: SleepMutex<VmSpace>,
    files: SpinNoIrqLock<[Option<Arc<File>>; NFILES]>,
    cwd: SpinNoIrqLock<Option<Arc<dyn Vnode>>>,
    /// The process's threads. Threads hold only weak back-references.
    threads: SpinNoIrqLock<Vec<Arc<KThread>>>,
    /// Where the parent sleeps in waitpid.
    child_exits: WaitQueue,
}

impl Process {
    fn build(name: &str, vm: VmSpace) -> Arc<Self> {
        const NO_FILE: Option<Arc<File>> = None;
        Arc::new(Self {
            pid: PID_ALLOCATOR.lock().alloc(),
            name: SpinNoIrqLock::new(name.to_string()),
            parent: SpinNoIrqLock::new(None),
            children: SpinNoIrqLock::new(Vec::new()),
            state: SpinNoIrqLock::new(ProcState::Live),
            vm: SleepMutex::new(vm),
            files: SpinNoIrqLock::new([NO_FILE; NFILES]),
            cwd: SpinNoIrqLock::new(None),
            threads: SpinNoIrqLock::new(Vec::new()),
            child_exits: WaitQueue::new(),
        })
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn vm(&self) -> SleepMutexGuard<'_, VmSpace> {
        self.vm.lock()
    }

    /// The working directory; the root until a chdir ever sets one.
    pub fn cwd(&self) -> SysResult<Arc<dyn Vnode>> {
        if let Some(cwd) = self.cwd.lock().clone() {
            return Ok(cwd);
        }
        vfs::mount::root_vnode()
    }

    pub fn set_cwd(&self, vnode: Arc<dyn Vnode>) {
        *self.cwd.lock() = Some(vnode);
    }

    /// Stores `file` in the lowest free descriptor slot.
    ///
    /// # Errors
    /// `EMFILE` when all slots are taken.
    pub fn alloc_fd(&self, file: Arc<File>) -> SysResult<usize> {
        let mut files = self.files.lock();
        let fd = files
            .iter()
            .position(Option::is_none)
            .ok_or(SysError::EMFILE)?;
        files[fd] = Some(file);
        Ok(fd)
    }

    pub fn get_file(&self, fd: usize) -> SysResult<Arc<File>> {
        self.files
            .lock()
            .get(fd)
            .and_then(Clone::clone)
            .ok_or(SysError::EBADF)
    }

    pub fn close_fd(&self, fd: usize) -> SysResult<()> {
        let file = self
            .files
            .lock()
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(SysError::EBADF)?;
        drop(file);
        Ok(())
    }

    /// Copies the descriptor table for fork: same open-file descriptions,
    /// reference counts bumped.
    fn dup_files(&self) -> [Option<Arc<File>>; NFILES] {
        self.files.lock().clone()
    }

    pub(crate) fn adopt_thread(self: &Arc<Self>, thread: &Arc<KThread>) {
        thread.set_process(self);
        self.threads.lock().push(Arc::clone(thread));
    }

    fn add_child(self: &Arc<Self>, child: &Arc<Process>) {
        *child.parent.lock() = Some(Arc::downgrade(self));
        self.children.lock().push(Arc::clone(child));
    }

    /// Waits for a child to exit: `pid` of -1 means any child. Returns
    /// the reaped child's pid and exit status.
    ///
    /// # Errors
    /// `ECHILD` when no (matching) child exists.
    pub fn waitpid(self: &Arc<Self>, pid: isize) -> SysResult<(usize, i32)> {
        loop {
            {
                let mut children = self.children.lock();
                let matching = children
                    .iter()
                    .any(|child| pid == -1 || child.pid as isize == pid);
                if !matching {
                    return Err(SysError::ECHILD);
                }
                let zombie = children.iter().position(|child| {
                    (pid == -1 || child.pid as isize == pid)
                        && matches!(*child.state.lock(), ProcState::Zombie(_))
                });
                if let Some(index) = zombie {
                    let child = children.remove(index);
                    let ProcState::Zombie(status) = *child.state.lock() else {
                        unreachable!("selected above");
                    };
                    PROC_TABLE.lock().remove(&child.pid);
                    return Ok((child.pid, status));
                }
            }
            self.child_exits.sleep();
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        PID_ALLOCATOR.lock().dealloc(self.pid);
    }
}

/// Creates the first process around the boot thread and switches onto
/// its page directory, so user addresses it touches resolve through its
/// own address-space map.
pub fn init() {
    let vm = VmSpace::new_user().expect("init address space");
    let init = Process::build("init", vm);
    init.adopt_thread(&current_thread());
    sched::set_current_page_dir(init.vm().pagedir.phys());
    PROC_TABLE.lock().insert(init.pid(), Arc::clone(&init));
    log::info!("[proc] init is pid {}", init.pid());
}

pub fn lookup(pid: usize) -> Option<Arc<Process>> {
    PROC_TABLE.lock().get(&pid).cloned()
}

/// Terminates the current process with `status`, releasing every
/// resource that external state can see before the thread dies.
pub fn exit_current(status: i32) -> ! {
    let proc = current_process();
    let thread = current_thread();
    log::info!("[exit] pid {} status {}", proc.pid(), status);

    // Closing files and dropping the cwd may write back; do it while the
    // thread can still block.
    for fd in 0..NFILES {
        let _ = proc.close_fd(fd);
    }
    proc.cwd.lock().take();

    {
        // Get off this process's page tables before tearing them down.
        unsafe { arch::mm::switch_page_dir(crate::vm::page_table::kernel_page_dir_phys()) };
        let mut vm = proc.vm();
        vm.map.remove(config::mm::USER_START_PAGE, config::mm::USER_END_PAGE - config::mm::USER_START_PAGE);
        vm.pagedir.unmap_user();
    }
    // The dying thread's context must not be resumed with the dead
    // directory either.
    unsafe { (*thread.context_ptr()).pd = crate::vm::page_table::kernel_page_dir_phys() };

    proc.threads.lock().retain(|t| t.tid() != thread.tid());
    *proc.state.lock() = ProcState::Zombie(status);

    let parent = proc.parent.lock().clone();
    if let Some(parent) = parent.and_then(|weak| weak.upgrade()) {
        parent.child_exits.wake_all();
    } else {
        // No one will wait; reap immediately.
        PROC_TABLE.lock().remove(&proc.pid());
    }
    drop(proc);
    sched::exit_current()
}

/// Exit status conventionally reported for a segmentation fault.
pub const SIGSEGV_STATUS: i32 = 128 + 11;

pub use fork::do_fork;

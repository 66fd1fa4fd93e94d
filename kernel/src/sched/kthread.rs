//! Kernel threads: a stack, a saved context, and a place in a process.

use core::arch::global_asm;
use core::cell::SyncUnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use arch::context::Context;
use arch::trap::Regs;
use config::mm::{KERNEL_STACK_SIZE, PAGE_SIZE};
use id_allocator::IdAllocator;
use mm::frame::FrameTracker;
use mutex::SpinNoIrqLock;
use systype::SysResult;

use crate::proc::Process;

static TID_ALLOCATOR: SpinNoIrqLock<IdAllocator> = SpinNoIrqLock::new(IdAllocator::starting_at(0));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Runnable,
    Running,
    Parked,
    Exited,
}

pub struct KThread {
    tid: usize,
    /// Saved machine context, touched only by the scheduler during a
    /// switch.
    context: SyncUnsafeCell<Context>,
    /// Contiguous frames backing the kernel stack. Empty for the adopted
    /// boot thread, which runs on the image's static stack.
    kstack: Vec<FrameTracker>,
    state: SpinNoIrqLock<ThreadState>,
    /// The one-shot wakeup permit behind park/unpark.
    permit: AtomicBool,
    process: SpinNoIrqLock<Option<Weak<Process>>>,
}

unsafe impl Send for KThread {}
unsafe impl Sync for KThread {}

global_asm!(
    "
    .text
    .global __thread_start
// First instruction of a spawned kernel thread. The spawner left
// [entry_fn, arg] at the stack top.
__thread_start:
    pop eax
    call eax
    call __kthread_exit
"
);

unsafe extern "C" {
    fn __thread_start();
}

#[unsafe(no_mangle)]
extern "C" fn __kthread_exit() -> ! {
    super::exit_current()
}

impl KThread {
    /// Wraps the flow of control that booted the machine in a thread
    /// structure, so it can switch like any other.
    pub(super) fn adopt_boot() -> Arc<Self> {
        let mut context = Context::zeroed();
        context.pd = arch::mm::current_page_dir();
        Arc::new(Self {
            tid: TID_ALLOCATOR.lock().alloc(),
            context: SyncUnsafeCell::new(context),
            kstack: Vec::new(),
            state: SpinNoIrqLock::new(ThreadState::Running),
            permit: AtomicBool::new(false),
            process: SpinNoIrqLock::new(None),
        })
    }

    fn build(context: Context, kstack: Vec<FrameTracker>) -> Arc<Self> {
        Arc::new(Self {
            tid: TID_ALLOCATOR.lock().alloc(),
            context: SyncUnsafeCell::new(context),
            kstack,
            state: SpinNoIrqLock::new(ThreadState::Runnable),
            permit: AtomicBool::new(false),
            process: SpinNoIrqLock::new(None),
        })
    }

    fn alloc_kstack() -> SysResult<(Vec<FrameTracker>, usize, usize)> {
        let frames = FrameTracker::build_contiguous(KERNEL_STACK_SIZE / PAGE_SIZE)?;
        let base = frames[0].vpn().address().to_usize();
        Ok((frames, base, base + KERNEL_STACK_SIZE))
    }

    /// Clones the calling user thread for fork: the child's first schedule
    /// restores `regs` (with a zeroed return register) and drops straight
    /// back to user mode.
    pub fn fork_user(regs: &Regs, pd_phys: usize) -> SysResult<Arc<Self>> {
        let (kstack, base, top) = Self::alloc_kstack()?;
        let frame_addr = top - core::mem::size_of::<Regs>();
        let child_frame = unsafe { &mut *(frame_addr as *mut Regs) };
        *child_frame = *regs;
        // fork returns 0 in the child.
        child_frame.eax = 0;

        let context = Context {
            eip: arch::trap::__trap_ret as usize,
            esp: frame_addr,
            pd: pd_phys,
            kstack_base: base,
            kstack_size: KERNEL_STACK_SIZE,
        };
        Ok(Self::build(context, kstack))
    }

    /// Spawns a kernel-mode thread running `entry(arg)`.
    pub fn spawn(entry: extern "C" fn(usize), arg: usize, pd_phys: usize) -> SysResult<Arc<Self>> {
        let (kstack, base, top) = Self::alloc_kstack()?;
        let esp = top - 2 * core::mem::size_of::<usize>();
        unsafe {
            *(esp as *mut usize) = entry as usize;
            *((esp + core::mem::size_of::<usize>()) as *mut usize) = arg;
        }
        let context = Context {
            eip: __thread_start as usize,
            esp,
            pd: pd_phys,
            kstack_base: base,
            kstack_size: KERNEL_STACK_SIZE,
        };
        Ok(Self::build(context, kstack))
    }

    pub fn tid(&self) -> usize {
        self.tid
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    pub(super) fn set_state(&self, state: ThreadState) {
        *self.state.lock() = state;
    }

    pub(super) fn take_permit(&self) -> bool {
        self.permit.swap(false, Ordering::Acquire)
    }

    pub(super) fn give_permit(&self) {
        self.permit.store(true, Ordering::Release);
    }

    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_process(&self, process: &Arc<Process>) {
        *self.process.lock() = Some(Arc::downgrade(process));
    }

    pub(super) fn context_ptr(&self) -> *mut Context {
        self.context.get()
    }

    /// Stack pointer loaded into the TSS when this thread runs, for traps
    /// arriving from user mode.
    pub(super) fn kstack_top(&self) -> usize {
        if self.kstack.is_empty() {
            0
        } else {
            self.kstack[0].vpn().address().to_usize() + KERNEL_STACK_SIZE
        }
    }
}

impl Drop for KThread {
    fn drop(&mut self) {
        TID_ALLOCATOR.lock().dealloc(self.tid);
    }
}

/// Spawns and immediately schedules a kernel thread in the kernel address
/// space.
pub fn spawn_kernel(entry: extern "C" fn(usize), arg: usize) -> SysResult<Arc<KThread>> {
    let thread = KThread::spawn(entry, arg, crate::vm::page_table::kernel_page_dir_phys())?;
    super::register(&thread);
    super::make_runnable(Arc::clone(&thread));
    Ok(thread)
}

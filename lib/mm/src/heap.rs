//! The kernel heap, a buddy-system allocator over a static arena.

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use buddy_system_allocator as buddy;

use config::mm::KERNEL_HEAP_SIZE;
use mutex::SpinNoIrqLock;

struct LockedHeap<const ORDER: usize>(SpinNoIrqLock<buddy::Heap<ORDER>>);

impl<const ORDER: usize> LockedHeap<ORDER> {
    const fn new() -> Self {
        Self(SpinNoIrqLock::new(buddy::Heap::empty()))
    }
}

unsafe impl GlobalAlloc for LockedHeap<32> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.0
            .lock()
            .alloc(layout)
            .ok()
            .map_or(ptr::null_mut(), |allocation| allocation.as_ptr())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.0.lock().dealloc(NonNull::new_unchecked(ptr), layout) }
    }
}

#[repr(align(4096))]
struct HeapMemory([u8; KERNEL_HEAP_SIZE]);

static mut HEAP_MEMORY: HeapMemory = HeapMemory([0; KERNEL_HEAP_SIZE]);

#[global_allocator]
static HEAP_ALLOCATOR: LockedHeap<32> = LockedHeap::new();

#[alloc_error_handler]
fn alloc_error_handler(layout: Layout) -> ! {
    panic!("kernel heap exhausted, layout = {layout:?}")
}

/// Hands the static arena to the allocator.
///
/// # Safety
/// Must be called exactly once, before the first allocation.
pub unsafe fn init_heap_allocator() {
    let start = unsafe {
        #[allow(static_mut_refs)]
        HEAP_MEMORY.0.as_ptr() as usize
    };
    unsafe {
        self::HEAP_ALLOCATOR.0.lock().init(start, KERNEL_HEAP_SIZE);
    }
    log::info!("heap memory: {:#x} - {:#x}", start, start + KERNEL_HEAP_SIZE);
}

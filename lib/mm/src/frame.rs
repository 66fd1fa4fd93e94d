//! The physical frame allocator.
//!
//! Frames outside the kernel image are tracked by [`FrameTracker`], an RAII
//! guard: constructing one allocates a frame, dropping it frees the frame.

use alloc::vec::Vec;

use bitmap_allocator::{BitAlloc, BitAlloc64K};

use config::mm::{PAGE_SIZE, kernel_end_phys};
use mutex::SpinNoIrqLock;
use systype::{SysError, SysResult};

use crate::address::{PhysAddr, PhysPageNum, VirtPageNum};

/// Global frame allocator. Bit index i stands for PPN `offset + i`.
struct FrameAllocator {
    allocator: SpinNoIrqLock<BitAlloc64K>,
    offset: core::cell::SyncUnsafeCell<usize>,
}

static FRAME_ALLOCATOR: FrameAllocator = FrameAllocator {
    allocator: SpinNoIrqLock::new(BitAlloc64K::DEFAULT),
    offset: core::cell::SyncUnsafeCell::new(0),
};

impl FrameAllocator {
    fn offset(&self) -> usize {
        // `offset` is never written after init.
        unsafe { *self.offset.get() }
    }
}

/// Makes the frames between the kernel image and `ram_end_phys` allocatable.
///
/// # Safety
/// Must be called exactly once, before the first allocation.
pub unsafe fn init_frame_allocator(ram_end_phys: usize) {
    let start = PhysAddr::new(kernel_end_phys()).page_number().to_usize();
    let end = PhysAddr::new(ram_end_phys).page_number().to_usize();
    // The bitmap bounds how much RAM is managed; anything beyond it (or
    // beyond the boot-time linear map) is left untouched.
    let count = (end - start).min(BitAlloc64K::CAP);
    unsafe {
        *FRAME_ALLOCATOR.offset.get() = start;
    }
    FRAME_ALLOCATOR.allocator.lock().insert(0..count);
    log::info!(
        "frame allocator: allocatable frames {:#x} - {:#x}",
        start * PAGE_SIZE,
        (start + count) * PAGE_SIZE
    );
}

/// RAII guard for one allocatable frame.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameTracker {
    ppn: PhysPageNum,
}

impl FrameTracker {
    /// Allocates a frame. The contents are whatever the previous owner
    /// left; callers that need zeroes fill them.
    ///
    /// # Errors
    /// `ENOMEM` when no free frames remain.
    pub fn build() -> SysResult<Self> {
        FRAME_ALLOCATOR
            .allocator
            .lock()
            .alloc()
            .map(|i| FrameTracker {
                ppn: PhysPageNum::new(FRAME_ALLOCATOR.offset() + i),
            })
            .ok_or(SysError::ENOMEM)
    }

    /// Allocates `count` physically contiguous frames, used for kernel
    /// thread stacks.
    ///
    /// # Errors
    /// `ENOMEM` when no contiguous run is free.
    pub fn build_contiguous(count: usize) -> SysResult<Vec<Self>> {
        let base = FRAME_ALLOCATOR
            .allocator
            .lock()
            .alloc_contiguous(None, count, 0)
            .ok_or(SysError::ENOMEM)?;
        Ok((base..base + count)
            .map(|i| FrameTracker {
                ppn: PhysPageNum::new(FRAME_ALLOCATOR.offset() + i),
            })
            .collect())
    }

    pub fn ppn(&self) -> PhysPageNum {
        self.ppn
    }

    /// The kernel-virtual page of the frame.
    pub fn vpn(&self) -> VirtPageNum {
        self.ppn.to_vpn_kernel()
    }

    pub fn as_slice(&self) -> &[u8; PAGE_SIZE] {
        // The frame is allocated and the slice cannot outlive the tracker.
        unsafe { self.vpn().as_slice() }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8; PAGE_SIZE] {
        unsafe { self.vpn().as_slice_mut() }
    }
}

impl Drop for FrameTracker {
    fn drop(&mut self) {
        FRAME_ALLOCATOR
            .allocator
            .lock()
            .dealloc(self.ppn.to_usize() - FRAME_ALLOCATOR.offset());
    }
}

pub fn frame_alloc_test() {
    let first = {
        let f1 = FrameTracker::build().expect("frame_alloc_test: alloc");
        let f2 = FrameTracker::build().expect("frame_alloc_test: alloc");
        assert_ne!(f1.ppn(), f2.ppn());
        f1.ppn()
    };
    // Both dropped; the low frame comes back first.
    let f3 = FrameTracker::build().expect("frame_alloc_test: alloc");
    assert_eq!(f3.ppn(), first);

    let frames = FrameTracker::build_contiguous(4).expect("frame_alloc_test: contiguous");
    for pair in frames.windows(2) {
        assert_eq!(pair[0].ppn().to_usize() + 1, pair[1].ppn().to_usize());
    }
    log::info!("[frame_alloc_test] pass");
}

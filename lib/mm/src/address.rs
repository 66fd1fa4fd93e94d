//! Typed physical and virtual addresses and page numbers.
//!
//! All four are thin wrappers over `usize` (32 bits on this machine).
//! Physical frames are reachable from kernel code through the linear map at
//! `KERNEL_MAP_OFFSET`, which is what [`PhysPageNum::to_vpn_kernel`] encodes.

use core::fmt;

use config::mm::{KERNEL_MAP_OFFSET, PAGE_SHIFT, PAGE_SIZE};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysAddr(usize);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtAddr(usize);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysPageNum(usize);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtPageNum(usize);

impl PhysAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn to_usize(self) -> usize {
        self.0
    }

    pub const fn page_number(self) -> PhysPageNum {
        PhysPageNum(self.0 >> PAGE_SHIFT)
    }
}

impl VirtAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn to_usize(self) -> usize {
        self.0
    }

    pub const fn page_number(self) -> VirtPageNum {
        VirtPageNum(self.0 >> PAGE_SHIFT)
    }

    pub const fn page_offset(self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    pub const fn round_down(self) -> Self {
        Self(self.0 & !(PAGE_SIZE - 1))
    }

    pub const fn round_up(self) -> Self {
        Self((self.0 + PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
    }
}

impl PhysPageNum {
    pub const fn new(ppn: usize) -> Self {
        Self(ppn)
    }

    pub const fn to_usize(self) -> usize {
        self.0
    }

    pub const fn address(self) -> PhysAddr {
        PhysAddr(self.0 << PAGE_SHIFT)
    }

    /// The kernel-virtual page through which this frame is addressed.
    pub const fn to_vpn_kernel(self) -> VirtPageNum {
        VirtPageNum(self.0 + (KERNEL_MAP_OFFSET >> PAGE_SHIFT))
    }
}

impl VirtPageNum {
    pub const fn new(vpn: usize) -> Self {
        Self(vpn)
    }

    pub const fn to_usize(self) -> usize {
        self.0
    }

    pub const fn address(self) -> VirtAddr {
        VirtAddr(self.0 << PAGE_SHIFT)
    }

    /// The physical frame behind a kernel-linear-map page.
    pub const fn to_ppn_kernel(self) -> PhysPageNum {
        PhysPageNum(self.0 - (KERNEL_MAP_OFFSET >> PAGE_SHIFT))
    }

    /// Views the page as a byte array.
    ///
    /// # Safety
    /// The page must be mapped for the lifetime of the returned slice, and
    /// the caller must rule out conflicting writes.
    pub unsafe fn as_slice(self) -> &'static [u8; PAGE_SIZE] {
        unsafe { &*(self.address().to_usize() as *const [u8; PAGE_SIZE]) }
    }

    /// Mutable view of the page. Same contract as [`Self::as_slice`].
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_slice_mut(self) -> &'static mut [u8; PAGE_SIZE] {
        unsafe { &mut *(self.address().to_usize() as *mut [u8; PAGE_SIZE]) }
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA:{:#x}", self.0)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA:{:#x}", self.0)
    }
}

impl fmt::Debug for PhysPageNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PPN:{:#x}", self.0)
    }
}

impl fmt::Debug for VirtPageNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VPN:{:#x}", self.0)
    }
}

//! Bit layout of 32-bit x86 page-directory and page-table entries.

use bitflags::bitflags;

bitflags! {
    /// Flag bits shared by PDEs and PTEs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        /// Translation is valid.
        const PRESENT  = 1 << 0;
        /// Writes allowed.
        const WRITABLE = 1 << 1;
        /// User-mode access allowed.
        const USER     = 1 << 2;
        /// Set by hardware on access.
        const ACCESSED = 1 << 5;
        /// Set by hardware on write.
        const DIRTY    = 1 << 6;
        /// Not flushed by CR3 reload.
        const GLOBAL   = 1 << 8;
    }
}

/// Mask selecting the frame address in an entry.
pub const PTE_FRAME_MASK: u32 = !0xfff;

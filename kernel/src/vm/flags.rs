use bitflags::bitflags;

bitflags! {
    /// `mmap` protection bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MmapProt: u32 {
        const PROT_READ  = 1 << 0;
        const PROT_WRITE = 1 << 1;
        const PROT_EXEC  = 1 << 2;
    }
}

bitflags! {
    /// `mmap` mapping flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MmapFlags: u32 {
        const MAP_SHARED  = 1 << 0;
        const MAP_PRIVATE = 1 << 1;
        const MAP_FIXED   = 1 << 4;
        const MAP_ANON    = 1 << 5;
    }
}

/// Direction a hole search sweeps the user window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDir {
    LowToHigh,
    /// The default for hint-less `mmap`: grow down from the top.
    HighToLow,
}

use bitflags::bitflags;

/// Number of file-descriptor slots per process.
pub const NFILES: usize = 32;

/// Longest accepted path component. Matches the on-disk directory entry
/// name field of the root file system.
pub const NAME_MAX: usize = 28;

/// Longest accepted path.
pub const PATH_MAX: usize = 1024;

bitflags! {
    /// Flags accepted by the `open` syscall.
    ///
    /// The low two bits select the access mode (`O_RDONLY`, `O_WRONLY`,
    /// `O_RDWR`); the remaining bits modify creation and write behavior.
    /// `bitflags` discourages zero-valued flags, so `O_RDONLY` is not a
    /// member; use [`OpenFlags::access_mode`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const O_WRONLY = 0o1;
        const O_RDWR   = 0o2;
        const O_CREAT  = 0o100;
        const O_APPEND = 0o2000;
    }
}

pub const O_RDONLY: u32 = 0;

impl OpenFlags {
    const ACCESS_MASK: u32 = 0o3;

    /// The access-mode bits, `O_RDONLY`/`O_WRONLY`/`O_RDWR` as raw values.
    pub fn access_mode(self) -> u32 {
        self.bits() & Self::ACCESS_MASK
    }
}

bitflags! {
    /// Mode of an open-file description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileMode: u32 {
        const READ   = 1 << 0;
        const WRITE  = 1 << 1;
        const APPEND = 1 << 2;
    }
}

/// Seek origin for `lseek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(usize),
    Current(isize),
    End(isize),
}

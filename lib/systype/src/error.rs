use strum::FromRepr;

/// Type alias for syscall results. A syscall returns a `usize` on success.
pub type SyscallResult = Result<usize, SysError>;
/// Type alias for results of general kernel functions.
pub type SysResult<T> = Result<T, SysError>;

/// Kernel error codes, the UNIX small-integer errno subset the kernel uses.
///
/// A syscall that fails returns the negated code to user space. File-system
/// corruption is not an error value; it panics the kernel at the point of
/// detection.
#[derive(FromRepr, Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum SysError {
    /// Operation not permitted
    EPERM = 1,
    /// No such file or directory
    ENOENT = 2,
    /// I/O error
    EIO = 5,
    /// No such device or address
    ENXIO = 6,
    /// Bad file number
    EBADF = 9,
    /// No child processes
    ECHILD = 10,
    /// Out of memory
    ENOMEM = 12,
    /// Permission denied
    EACCES = 13,
    /// Bad address
    EFAULT = 14,
    /// Device or resource busy
    EBUSY = 16,
    /// File exists
    EEXIST = 17,
    /// No such device
    ENODEV = 19,
    /// Not a directory
    ENOTDIR = 20,
    /// Is a directory
    EISDIR = 21,
    /// Invalid argument
    EINVAL = 22,
    /// Too many open files
    EMFILE = 24,
    /// No space left on device
    ENOSPC = 28,
    /// File name too long
    ENAMETOOLONG = 36,
    /// Directory not empty
    ENOTEMPTY = 39,
}

impl SysError {
    /// Human-readable description, for log and panic messages.
    pub const fn description(self) -> &'static str {
        use SysError::*;
        match self {
            EPERM => "Operation not permitted",
            ENOENT => "No such file or directory",
            EIO => "I/O error",
            ENXIO => "No such device or address",
            EBADF => "Bad file number",
            ECHILD => "No child processes",
            ENOMEM => "Out of memory",
            EACCES => "Permission denied",
            EFAULT => "Bad address",
            EBUSY => "Device or resource busy",
            EEXIST => "File exists",
            ENODEV => "No such device",
            ENOTDIR => "Not a directory",
            EISDIR => "Is a directory",
            EINVAL => "Invalid argument",
            EMFILE => "Too many open files",
            ENOSPC => "No space left on device",
            ENAMETOOLONG => "File name too long",
            ENOTEMPTY => "Directory not empty",
        }
    }

    pub const fn from_i32(value: i32) -> Self {
        match Self::from_repr(value) {
            Some(err) => err,
            None => panic!("not an error code"),
        }
    }

    /// Returns the error code value in `i32`.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

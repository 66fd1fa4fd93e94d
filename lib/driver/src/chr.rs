use config::device::DevId;
use systype::SyscallResult;

/// A byte-stream device, the tty being the one that matters here.
pub trait CharDevice: Send + Sync {
    fn dev_id(&self) -> DevId;

    /// Reads up to `buf.len()` bytes; returns the count read.
    fn read(&self, buf: &mut [u8]) -> SyscallResult;

    /// Writes `buf`; returns the count written.
    fn write(&self, buf: &[u8]) -> SyscallResult;
}

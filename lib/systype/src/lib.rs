#![no_std]

pub mod error;

pub use error::{SysError, SysResult, SyscallResult};

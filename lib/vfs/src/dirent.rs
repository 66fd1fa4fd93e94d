use alloc::string::String;

use config::inode::VnodeType;

/// One directory entry, as handed out by `readdir`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub ino: u32,
    pub vtype: VnodeType,
    pub name: String,
}

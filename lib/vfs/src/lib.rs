#![no_std]

extern crate alloc;

pub mod dirent;
pub mod file;
pub mod fs;
pub mod mount;
pub mod path;
pub mod stat;
pub mod vcache;
pub mod vnode;
pub mod vobject;

pub use dirent::DirEntry;
pub use file::File;
pub use fs::{FileSystem, FileSystemMeta};
pub use stat::Stat;
pub use vcache::{vget, vput};
pub use vnode::{Vnode, VnodeMeta};

#![no_std]

extern crate alloc;

mod fs;
mod fsck;
mod layout;
mod mkfs;
mod node;
mod subr;

pub use fs::S5FileSystem;
pub use layout::{S5_BLOCK_SIZE, S5_MAX_FILE_SIZE, S5_NAME_LEN};
pub use mkfs::mkfs;

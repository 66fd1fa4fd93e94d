#![no_std]

extern crate alloc;

mod block;
mod chr;
mod ramdisk;
mod registry;

pub use block::BlockDevice;
pub use chr::CharDevice;
pub use ramdisk::RamDisk;
pub use registry::{
    lookup_block_device, lookup_char_device, register_block_device, register_char_device,
};

#![no_std]
#![feature(alloc_error_handler)]
#![feature(sync_unsafe_cell)]

extern crate alloc;

pub mod address;
pub mod frame;
pub mod heap;
pub mod mmobj;
pub mod pframe;

#![no_std]

extern crate alloc;

use alloc::vec::Vec;

/// Hands out small integer ids, reusing released ones before growing.
///
/// Used for pids, thread ids and file-system ids.
pub struct IdAllocator {
    next: usize,
    recycled: Vec<usize>,
}

impl IdAllocator {
    /// Creates an allocator whose first fresh id is `first`.
    pub const fn starting_at(first: usize) -> Self {
        Self {
            next: first,
            recycled: Vec::new(),
        }
    }

    pub fn alloc(&mut self) -> usize {
        if let Some(id) = self.recycled.pop() {
            id
        } else {
            let id = self.next;
            self.next += 1;
            id
        }
    }

    pub fn dealloc(&mut self, id: usize) {
        debug_assert!(id < self.next && !self.recycled.contains(&id));
        self.recycled.push(id);
    }
}

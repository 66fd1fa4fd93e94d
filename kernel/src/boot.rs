//! Multiboot information, read once at startup.

use config::mm::{KERNEL_MAP_OFFSET, RAM_SIZE_DEFAULT};
use multiboot::information::{MemoryManagement, Multiboot, PAddr};

/// The loader's tables live in low memory, reachable through the linear
/// map; nothing is ever allocated.
struct LinearMapAccess;

impl MemoryManagement for LinearMapAccess {
    unsafe fn paddr_to_slice(&self, addr: PAddr, size: usize) -> Option<&'static [u8]> {
        let virt = addr as usize + KERNEL_MAP_OFFSET;
        Some(unsafe { core::slice::from_raw_parts(virt as *const u8, size) })
    }

    unsafe fn allocate(&mut self, _length: usize) -> Option<(PAddr, &mut [u8])> {
        None
    }

    unsafe fn deallocate(&mut self, addr: PAddr) {
        assert_eq!(addr, 0);
    }
}

static mut MEM: LinearMapAccess = LinearMapAccess;

/// Physical memory the boot stub's linear map covers; RAM past this is
/// left unused.
const LINEAR_MAP_SIZE: usize = 256 * 1024 * 1024;

/// End of usable physical memory, from the loader's memory bounds.
/// Falls back to a fixed size when the loader supplied none.
pub fn memory_end(mbi_phys: usize) -> usize {
    let upper_kib = unsafe {
        #[allow(static_mut_refs)]
        Multiboot::from_ptr(mbi_phys as PAddr, &mut MEM)
    }
    .and_then(|mbi| mbi.upper_memory_bound());
    let end = match upper_kib {
        // Upper memory is counted from the 1 MiB line.
        Some(kib) => 0x10_0000 + kib as usize * 1024,
        None => RAM_SIZE_DEFAULT,
    };
    end.min(LINEAR_MAP_SIZE)
}

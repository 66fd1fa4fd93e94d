//! Per-process virtual memory: the address-space map, the page tables
//! under it, and the fault handler tying them to the page cache.

pub mod fault;
pub mod flags;
pub mod page_table;
pub mod user;
pub mod vmmap;

use alloc::sync::Arc;

use mm::mmobj::ShadowObject;
use systype::SysResult;

use page_table::PageDir;
use vmmap::VmMap;

/// Everything a process knows about its address space.
pub struct VmSpace {
    pub map: VmMap,
    pub pagedir: PageDir,
    pub brk: usize,
    pub start_brk: usize,
}

impl VmSpace {
    pub fn new_user() -> SysResult<Self> {
        Ok(Self {
            map: VmMap::new(),
            pagedir: PageDir::build()?,
            brk: 0,
            start_brk: 0,
        })
    }
}

/// The address-space half of fork.
///
/// Clones the map, then interposes a fresh shadow object over every
/// private area on both sides; the formerly-top object becomes the shared
/// middle of both chains, so writes after this point diverge. The
/// parent's user translations are scrubbed so its next touch refaults
/// through its new shadow.
pub fn fork_vmspace(parent: &mut VmSpace) -> SysResult<VmSpace> {
    let mut child_map = parent.map.clone_map();

    for (parea, carea) in parent.map.areas_mut().zip(child_map.areas_mut()) {
        debug_assert_eq!(parea.start, carea.start);
        if parea.is_private() {
            let bottom = Arc::clone(&parea.obj);
            parea.obj = ShadowObject::new(Arc::clone(&bottom));
            carea.obj = ShadowObject::new(bottom);
        }
    }

    parent.pagedir.unmap_user();
    arch::mm::tlb_flush_all();

    Ok(VmSpace {
        map: child_map,
        pagedir: PageDir::build()?,
        brk: parent.brk,
        start_brk: parent.start_brk,
    })
}

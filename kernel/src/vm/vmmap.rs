//! The address-space map: ordered, disjoint virtual-memory areas.
//!
//! All bookkeeping is in page numbers. The map owns the memory-object
//! references of its areas; page tables and the TLB are the caller's
//! problem, flagged in each operation's contract.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use config::mm::{USER_END_PAGE, USER_START_PAGE};
use mm::mmobj::{AnonObject, MemObject, ShadowObject};
use systype::{SysError, SysResult};
use vfs::Vnode;

use super::flags::{MapDir, MmapFlags, MmapProt};

/// One contiguous mapped range: `[start, end)` in page numbers.
pub struct VmArea {
    pub start: usize,
    pub end: usize,
    /// Page offset into the object at which this area begins.
    pub off: usize,
    pub prot: MmapProt,
    pub flags: MmapFlags,
    /// The page source. For a private area this is always the top of a
    /// shadow chain; for a shared area, the bottom object itself.
    pub obj: Arc<dyn MemObject>,
    /// Keeps a mapped file's vnode alive for the life of the mapping.
    pub vnode: Option<Arc<dyn Vnode>>,
}

impl VmArea {
    pub fn npages(&self) -> usize {
        self.end - self.start
    }

    pub fn contains(&self, pageno: usize) -> bool {
        (self.start..self.end).contains(&pageno)
    }

    pub fn is_private(&self) -> bool {
        self.flags.contains(MmapFlags::MAP_PRIVATE)
    }

    fn dup(&self) -> Self {
        Self {
            start: self.start,
            end: self.end,
            off: self.off,
            prot: self.prot,
            flags: self.flags,
            obj: Arc::clone(&self.obj),
            vnode: self.vnode.clone(),
        }
    }
}

pub struct VmMap {
    /// Areas keyed by starting page; disjoint by construction.
    areas: BTreeMap<usize, VmArea>,
}

impl VmMap {
    pub fn new() -> Self {
        Self {
            areas: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn areas(&self) -> impl Iterator<Item = &VmArea> {
        self.areas.values()
    }

    pub fn areas_mut(&mut self) -> impl Iterator<Item = &mut VmArea> {
        self.areas.values_mut()
    }

    /// The area containing `pageno`, if any.
    pub fn lookup(&self, pageno: usize) -> Option<&VmArea> {
        self.areas
            .range(..=pageno)
            .next_back()
            .map(|(_, area)| area)
            .filter(|area| area.contains(pageno))
    }

    fn insert(&mut self, area: VmArea) {
        debug_assert!(area.start < area.end);
        debug_assert!(self.range_is_free(area.start, area.npages()));
        self.areas.insert(area.start, area);
    }

    fn range_is_free(&self, lopage: usize, npages: usize) -> bool {
        let hipage = lopage + npages;
        !self
            .areas
            .values()
            .any(|area| area.start < hipage && lopage < area.end)
    }

    /// Finds `npages` of unmapped space inside the user window, sweeping
    /// in `dir`.
    pub fn find_range(&self, npages: usize, dir: MapDir) -> Option<usize> {
        let mut holes: Vec<(usize, usize)> = Vec::new();
        let mut cursor = USER_START_PAGE;
        for area in self.areas.values() {
            if area.start > cursor {
                holes.push((cursor, area.start));
            }
            cursor = cursor.max(area.end);
        }
        if cursor < USER_END_PAGE {
            holes.push((cursor, USER_END_PAGE));
        }
        match dir {
            MapDir::LowToHigh => holes
                .iter()
                .find(|(lo, hi)| hi - lo >= npages)
                .map(|&(lo, _)| lo),
            MapDir::HighToLow => holes
                .iter()
                .rev()
                .find(|(lo, hi)| hi - lo >= npages)
                .map(|&(_, hi)| hi - npages),
        }
    }

    /// Maps `npages` pages of `vnode` (or fresh anonymous memory) at
    /// `lopage`, or at a found hole when `lopage` is zero.
    ///
    /// A nonzero `lopage` evicts whatever it overlaps, exactly like the
    /// syscall's `MAP_FIXED`; the caller is responsible for the evicted
    /// range's page-table entries and TLB. Returns the starting page.
    ///
    /// # Errors
    /// `EINVAL` for a nonzero `lopage` outside the user window; `ENOMEM`
    /// when no hole fits.
    pub fn map(
        &mut self,
        vnode: Option<Arc<dyn Vnode>>,
        lopage: usize,
        npages: usize,
        prot: MmapProt,
        flags: MmapFlags,
        off: usize,
        dir: MapDir,
    ) -> SysResult<usize> {
        debug_assert!(npages > 0);
        let start = if lopage == 0 {
            self.find_range(npages, dir).ok_or(SysError::ENOMEM)?
        } else {
            if lopage < USER_START_PAGE || lopage + npages > USER_END_PAGE {
                return Err(SysError::EINVAL);
            }
            self.remove(lopage, npages);
            lopage
        };

        let bottom: Arc<dyn MemObject> = match &vnode {
            Some(vnode) => vnode.object(),
            None => AnonObject::new(),
        };
        let obj = if flags.contains(MmapFlags::MAP_PRIVATE) {
            ShadowObject::new(bottom)
        } else {
            bottom
        };

        self.insert(VmArea {
            start,
            end: start + npages,
            off,
            prot,
            flags: flags & (MmapFlags::MAP_PRIVATE | MmapFlags::MAP_SHARED),
            obj,
            vnode,
        });
        log::debug!("[vmmap_map] pages {start:#x}..{:#x}", start + npages);
        Ok(start)
    }

    /// Unmaps exactly `[lopage, lopage + npages)`: overlapping areas are
    /// deleted, truncated, or split, and their object references dropped.
    /// Unmapped portions of the range are ignored, so the operation is
    /// idempotent. The caller clears page-table entries and the TLB.
    pub fn remove(&mut self, lopage: usize, npages: usize) {
        let hipage = lopage + npages;
        let overlapping: Vec<usize> = self
            .areas
            .values()
            .filter(|area| area.start < hipage && lopage < area.end)
            .map(|area| area.start)
            .collect();

        for start in overlapping {
            let area = self.areas.remove(&start).expect("collected above");
            if lopage > area.start {
                // The low part survives.
                let mut low = area.dup();
                low.end = lopage;
                self.insert(low);
            }
            if hipage < area.end {
                // The high part survives, shifted within the object.
                let mut high = area.dup();
                high.off = area.off + (hipage - area.start);
                high.start = hipage;
                self.insert(high);
            }
            // The middle of `area` drops with it, releasing its object
            // reference (shared with any surviving halves).
        }
    }

    /// Duplicate of the map, sharing every area's object (whose reference
    /// count rises accordingly). Shadow interposition for fork is the
    /// fork path's job, not this function's.
    pub fn clone_map(&self) -> Self {
        Self {
            areas: self
                .areas
                .iter()
                .map(|(&start, area)| (start, area.dup()))
                .collect(),
        }
    }

    /// Checks the ordering/disjointness invariant, for the test suite.
    pub fn check_invariants(&self) {
        let mut last_end = 0;
        for area in self.areas.values() {
            assert!(area.start < area.end);
            assert!(area.start >= last_end, "areas overlap or are unsorted");
            assert!(area.start >= USER_START_PAGE && area.end <= USER_END_PAGE);
            last_end = area.end;
        }
    }
}

impl Default for VmMap {
    fn default() -> Self {
        Self::new()
    }
}

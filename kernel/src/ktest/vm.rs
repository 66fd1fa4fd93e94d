//! Address-space map and shadow-chain tests.

use alloc::sync::Arc;

use config::mm::{USER_END_PAGE, USER_START_PAGE};
use mm::mmobj::{AnonObject, MemObject, ShadowObject};

use crate::vm::flags::{MapDir, MmapFlags, MmapProt};
use crate::vm::vmmap::VmMap;
use crate::vm::{VmSpace, fork_vmspace};

const RW: MmapProt = MmapProt::PROT_READ.union(MmapProt::PROT_WRITE);

pub fn vmmap_test() {
    let mut map = VmMap::new();

    let a = map
        .map(None, 0, 4, RW, MmapFlags::MAP_PRIVATE, 0, MapDir::HighToLow)
        .unwrap();
    assert_eq!(a + 4, USER_END_PAGE);
    let b = map
        .map(None, 0, 2, RW, MmapFlags::MAP_SHARED, 0, MapDir::LowToHigh)
        .unwrap();
    assert_eq!(b, USER_START_PAGE);
    map.check_invariants();

    assert!(map.lookup(a).is_some());
    assert!(map.lookup(a + 3).is_some());
    assert!(map.lookup(a - 1).is_none());
    assert!(map.lookup(b + 1).is_some());

    // A private area's object is a shadow; a shared area's is the bottom.
    assert!(map.lookup(a).unwrap().obj.shadowed().is_some());
    assert!(map.lookup(b).unwrap().obj.shadowed().is_none());

    // A fixed-address map inside the user window, and one outside it.
    let fixed = USER_START_PAGE + 0x100;
    let c = map
        .map(None, fixed, 3, RW, MmapFlags::MAP_PRIVATE, 0, MapDir::HighToLow)
        .unwrap();
    assert_eq!(c, fixed);
    assert!(
        map.map(None, USER_END_PAGE - 1, 2, RW, MmapFlags::MAP_PRIVATE, 0, MapDir::HighToLow)
            .is_err()
    );
    map.check_invariants();

    // Fixed mapping over an existing one evicts it.
    let d = map
        .map(None, fixed + 1, 1, RW, MmapFlags::MAP_SHARED, 0, MapDir::HighToLow)
        .unwrap();
    assert_eq!(d, fixed + 1);
    map.check_invariants();
    assert!(map.lookup(fixed).is_some());
    assert!(map.lookup(fixed + 1).unwrap().flags.contains(MmapFlags::MAP_SHARED));

    log::info!("[ktest] vmmap_test pass");
}

pub fn vmmap_remove_test() {
    let mut map = VmMap::new();
    let start = map
        .map(None, 0, 8, RW, MmapFlags::MAP_PRIVATE, 0, MapDir::LowToHigh)
        .unwrap();

    // Punch a hole in the middle: the area splits, the right half keeps
    // its object offset in step.
    map.remove(start + 3, 2);
    map.check_invariants();
    let left = map.lookup(start + 2).unwrap();
    assert_eq!((left.start, left.end, left.off), (start, start + 3, 0));
    assert!(map.lookup(start + 3).is_none());
    assert!(map.lookup(start + 4).is_none());
    let right = map.lookup(start + 5).unwrap();
    assert_eq!((right.start, right.end, right.off), (start + 5, start + 8, 5));
    // Both halves still cite the same object.
    assert!(Arc::ptr_eq(&map.lookup(start).unwrap().obj, &map.lookup(start + 5).unwrap().obj));

    // Removing an already-unmapped range is a no-op.
    map.remove(start + 3, 2);
    map.check_invariants();
    assert!(map.lookup(start).is_some());
    assert!(map.lookup(start + 5).is_some());

    // Removing across everything empties the map.
    map.remove(start, 8);
    assert!(map.is_empty());

    log::info!("[ktest] vmmap_remove_test pass");
}

pub fn shadow_chain_test() {
    let bottom = AnonObject::new();
    let middle = ShadowObject::new(Arc::clone(&bottom));
    let top = ShadowObject::new(Arc::clone(&middle));

    // The chain ends at exactly one non-shadow object.
    assert!(Arc::ptr_eq(&top.bottom(), &bottom));
    assert!(Arc::ptr_eq(&middle.bottom(), &bottom));

    // A write materializes the page in the object written through.
    let frame = middle.lookup_page(0, true).unwrap();
    frame.as_mut_slice()[0] = b'A';
    assert_eq!(middle.nresident(), 1);

    // A read through the top finds the middle's page and creates none
    // above it.
    let read = top.lookup_page(0, false).unwrap();
    assert_eq!(read.as_slice()[0], b'A');
    assert!(Arc::ptr_eq(&read, &frame));
    assert_eq!(top.nresident(), 0);

    // A read of an untouched page falls through to the (zero) bottom.
    let zero = top.lookup_page(5, false).unwrap();
    assert_eq!(zero.as_slice()[0], 0);
    assert_eq!(bottom.nresident(), 2);

    // The cache key law: the frame is findable under its (object, page).
    let resident = middle.resident(0).unwrap();
    assert!(Arc::ptr_eq(&resident, &frame));
    assert_eq!(resident.pageno(), 0);

    log::info!("[ktest] shadow_chain_test pass");
}

/// Pin and dirty bookkeeping against eviction.
pub fn pframe_pin_test() {
    let obj = AnonObject::new();
    let a = obj.get_page(0).unwrap();
    let b = obj.get_page(1).unwrap();
    let c = obj.get_page(2).unwrap();
    assert_eq!(obj.nresident(), 3);

    a.pin();
    b.mark_dirty().unwrap();
    assert!(!a.reclaimable());
    assert!(!b.reclaimable());
    assert!(c.reclaimable());

    // Reclaim drops only the unpinned clean frame.
    obj.reclaim();
    assert_eq!(obj.nresident(), 2);
    assert!(obj.resident(0).is_some());
    assert!(obj.resident(1).is_some());
    assert!(obj.resident(2).is_none());

    // Cleaning an anonymous page just clears the dirty bit (no store),
    // and unpinning stacks down to zero.
    b.clean().unwrap();
    a.pin();
    a.unpin();
    assert!(!a.reclaimable());
    a.unpin();
    obj.reclaim();
    assert_eq!(obj.nresident(), 0);

    // A re-get refills on the new miss.
    let again = obj.get_page(0).unwrap();
    assert!(!Arc::ptr_eq(&again, &a));

    log::info!("[ktest] pframe_pin_test pass");
}

/// The copy-on-write isolation scenario: parent writes A, forks, child
/// writes B; each then reads back only its own byte.
pub fn cow_fork_test() {
    let mut parent = VmSpace::new_user().unwrap();
    let page = parent
        .map
        .map(None, 0, 1, RW, MmapFlags::MAP_PRIVATE, 0, MapDir::HighToLow)
        .unwrap();

    let write = |space: &VmSpace, value: u8| {
        let area = space.map.lookup(page).unwrap();
        let frame = area.obj.lookup_page(area.off, true).unwrap();
        frame.mark_dirty().unwrap();
        frame.as_mut_slice()[0] = value;
    };
    let read = |space: &VmSpace| {
        let area = space.map.lookup(page).unwrap();
        area.obj.lookup_page(area.off, false).unwrap().as_slice()[0]
    };

    write(&parent, b'A');
    let child = fork_vmspace(&mut parent).unwrap();

    // Both sides see the pre-fork byte through their fresh shadows.
    assert_eq!(read(&parent), b'A');
    assert_eq!(read(&child), b'A');

    write(&child, b'B');
    assert_eq!(read(&parent), b'A');
    assert_eq!(read(&child), b'B');

    // And a parent write after that stays invisible to the child.
    write(&parent, b'C');
    assert_eq!(read(&parent), b'C');
    assert_eq!(read(&child), b'B');

    // A second fork nests another shadow and still isolates.
    let mut child = child;
    let grandchild = fork_vmspace(&mut child).unwrap();
    write(&child, b'D');
    assert_eq!(read(&grandchild), b'B');
    assert_eq!(read(&child), b'D');

    log::info!("[ktest] cow_fork_test pass");
}

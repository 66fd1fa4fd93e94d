//! The vnode cache: at most one live vnode per (fs, ino).
//!
//! The table holds weak references; a vnode's lifetime is its `Arc` count.
//! The last drop runs the owning file system's delete path from the
//! concrete vnode's `Drop` impl, which must call [`forget`] before its
//! first suspension point, so a concurrent `vget` never resurrects a
//! dying entry on this single-CPU kernel.

use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use hashbrown::HashMap;
use mutex::{SpinNoIrqLock, WaitQueue};
use systype::SysResult;

use crate::fs::FileSystem;
use crate::vnode::Vnode;

type Key = (usize, u32);

struct CacheInner {
    map: HashMap<Key, Weak<dyn Vnode>>,
    /// Keys whose `read_vnode` is in flight; lookers-on wait rather than
    /// starting a second read.
    pending: Vec<Key>,
}

static CACHE: SpinNoIrqLock<Option<CacheInner>> = SpinNoIrqLock::new(None);
static CACHE_WAIT: WaitQueue = WaitQueue::new();

fn with_cache<R>(f: impl FnOnce(&mut CacheInner) -> R) -> R {
    let mut guard = CACHE.lock();
    let inner = guard.get_or_insert_with(|| CacheInner {
        map: HashMap::new(),
        pending: Vec::new(),
    });
    f(inner)
}

/// Returns the unique vnode for (`fs`, `ino`), reading it in on a miss.
/// The returned `Arc` is the caller's reference; release it with [`vput`].
pub fn vget(fs: &Arc<dyn FileSystem>, ino: u32) -> SysResult<Arc<dyn Vnode>> {
    let key = (fs.id(), ino);
    loop {
        let wait = with_cache(|inner| {
            if let Some(weak) = inner.map.get(&key) {
                if let Some(vnode) = weak.upgrade() {
                    return Ok(Some(vnode));
                }
                inner.map.remove(&key);
            }
            if inner.pending.contains(&key) {
                Ok(None)
            } else {
                inner.pending.push(key);
                Err(())
            }
        });
        match wait {
            Ok(Some(vnode)) => return Ok(vnode),
            Ok(None) => {
                CACHE_WAIT.sleep();
                continue;
            }
            Err(()) => break,
        }
    }

    // This thread owns the read for `key`.
    let result = Arc::clone(fs).read_vnode(ino);
    with_cache(|inner| {
        inner.pending.retain(|k| k != &key);
        if let Ok(vnode) = &result {
            inner.map.insert(key, Arc::downgrade(vnode));
        }
    });
    CACHE_WAIT.wake_all();
    result
}

/// Releases a reference obtained from [`vget`].
///
/// Dropping the `Arc` is equivalent; this name exists because "vput the
/// vnode you vgot" is how every caller reasons about it. When this was the
/// last reference, the file system's `delete_vnode` runs via the vnode's
/// `Drop`.
pub fn vput(vnode: Arc<dyn Vnode>) {
    drop(vnode);
}

/// Removes a dying vnode's entry. Called by concrete vnodes at the top of
/// `Drop`.
pub fn forget(fs_id: usize, ino: u32) {
    with_cache(|inner| {
        inner.map.remove(&(fs_id, ino));
    });
}

/// Number of live vnodes of file system `fs_id`, for unmount-time checks.
pub fn live_count(fs_id: usize) -> usize {
    with_cache(|inner| {
        inner
            .map
            .iter()
            .filter(|((id, _), weak)| *id == fs_id && weak.strong_count() > 0)
            .count()
    })
}

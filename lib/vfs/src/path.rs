//! Path resolution.
//!
//! Paths resolve component by component through each directory's `lookup`,
//! starting from the root vnode for absolute paths or a supplied base for
//! relative ones. Each step locks the parent inside its `lookup` before
//! the child vnode exists, giving the parent-before-child lock order for
//! free.

use alloc::string::String;
use alloc::sync::Arc;

use config::vfs::{NAME_MAX, OpenFlags, PATH_MAX};
use systype::{SysError, SysResult};

use crate::mount;
use crate::vnode::Vnode;

/// Splits `path` into its components, rejecting oversized input.
fn components(path: &str) -> SysResult<impl Iterator<Item = &str>> {
    if path.len() > PATH_MAX {
        return Err(SysError::ENAMETOOLONG);
    }
    Ok(path.split('/').filter(|name| !name.is_empty()))
}

fn check_name(name: &str) -> SysResult<&str> {
    if name.len() > NAME_MAX {
        Err(SysError::ENAMETOOLONG)
    } else {
        Ok(name)
    }
}

fn walk_base(path: &str, base: Option<Arc<dyn Vnode>>) -> SysResult<Arc<dyn Vnode>> {
    if path.starts_with('/') {
        mount::root_vnode()
    } else {
        base.ok_or(SysError::ENOENT)
    }
}

/// Resolves `path` fully, failing with `ENOENT` if any component is
/// missing.
pub fn namev(path: &str, base: Option<Arc<dyn Vnode>>) -> SysResult<Arc<dyn Vnode>> {
    let mut vnode = walk_base(path, base)?;
    for name in components(path)? {
        vnode = vnode.lookup(check_name(name)?)?;
    }
    Ok(vnode)
}

/// Resolves all but the last component of `path`.
///
/// Returns the parent directory's vnode and the final name. A trailing
/// empty name (path `"/"`) is returned as `""`; callers that need a real
/// entry reject it.
pub fn dir_namev(path: &str, base: Option<Arc<dyn Vnode>>) -> SysResult<(Arc<dyn Vnode>, String)> {
    let mut vnode = walk_base(path, base.clone())?;
    let mut names = components(path)?.peekable();
    let mut last = "";
    while let Some(name) = names.next() {
        check_name(name)?;
        if names.peek().is_none() {
            last = name;
            break;
        }
        vnode = vnode.lookup(name)?;
    }
    if !vnode.vtype().is_dir() {
        return Err(SysError::ENOTDIR);
    }
    Ok((vnode, String::from(last)))
}

/// Resolves `path` for `open`: honors `O_CREAT` on the final component and
/// refuses to open a directory for writing.
pub fn open_namev(
    path: &str,
    oflags: OpenFlags,
    base: Option<Arc<dyn Vnode>>,
) -> SysResult<Arc<dyn Vnode>> {
    let (parent, name) = dir_namev(path, base)?;
    let vnode = if name.is_empty() {
        parent
    } else {
        match parent.lookup(&name) {
            Ok(vnode) => vnode,
            Err(SysError::ENOENT) if oflags.contains(OpenFlags::O_CREAT) => {
                parent.create(&name)?
            }
            Err(err) => return Err(err),
        }
    };
    // O_RDONLY is the zero access mode.
    let wants_write = oflags.access_mode() != 0;
    if vnode.vtype().is_dir() && wants_write {
        return Err(SysError::EISDIR);
    }
    Ok(vnode)
}

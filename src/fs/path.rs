//! Path resolution.

use super::FileSystem;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::layout::MAX_NAME_LEN;

/// Iterates the non-empty components of a slash-separated path.
///
/// The path is consumed as name slices; nothing is copied.
pub(crate) fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Splits an absolute path into its parent path and final name.
///
/// The parent of a top-level name is `/`. Fails on the root itself, on a
/// trailing slash and on names longer than the on-disk name field.
pub(crate) fn split_parent(path: &str) -> Result<(&str, &str), Error> {
    let (parent, name) = path.rsplit_once('/').ok_or(Error::InvalidArgument)?;
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument);
    }
    let parent = if parent.is_empty() { "/" } else { parent };
    Ok((parent, name))
}

impl<D: BlockDevice> FileSystem<D> {
    /// Resolves an absolute path to an inode number, walking the
    /// directory tree from the root.
    pub(crate) fn lookup(&mut self, path: &str) -> Result<u32, Error> {
        let mut cur = self.root_inode();
        for name in components(path) {
            let ino = self.inode(cur);
            if !ino.is_directory() {
                return Err(Error::NotDirectory);
            }
            let table = self.read_dir_block(ino.direct[0]);
            let entry = table.find(name).ok_or(Error::NotFound)?;
            cur = entry.inode();
        }
        Ok(cur)
    }
}

//! The fixed-capacity directory entry table.

use super::FileSystem;
use crate::device::BlockDevice;
use crate::layout::DIRENTS_PER_BLOCK;
use crate::layout::DirEntry;
use crate::util;

/// One directory block: the fixed array of entries held in `direct[0]`.
///
/// Entries are unordered; an invalid slot is free for reuse. The table is
/// loaded whole, mutated in memory, and written back whole.
#[derive(Clone, Copy)]
#[repr(C)]
pub(crate) struct DirBlock {
    entries: [DirEntry; DIRENTS_PER_BLOCK],
}

impl DirBlock {
    pub fn new() -> Self {
        Self {
            entries: [DirEntry::default(); DIRENTS_PER_BLOCK],
        }
    }

    /// Linear scan for a valid entry named `name`.
    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries
            .iter()
            .find(|e| e.is_valid() && e.name_bytes() == name.as_bytes())
    }

    /// Like [`Self::find`], for mutation in place.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut DirEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.is_valid() && e.name_bytes() == name.as_bytes())
    }

    /// Index of the first invalid slot, if any is left.
    pub fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_valid())
    }

    pub fn entry_mut(&mut self, i: usize) -> &mut DirEntry {
        &mut self.entries[i]
    }

    /// Tells whether the table holds no valid entry.
    pub fn is_empty(&self) -> bool {
        !self.entries.iter().any(DirEntry::is_valid)
    }

    /// Iterates the valid entries.
    pub fn valid_entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| e.is_valid())
    }
}

impl<D: BlockDevice> FileSystem<D> {
    /// Loads the directory table stored in block `blk`.
    pub(crate) fn read_dir_block(&mut self, blk: u32) -> DirBlock {
        let mut table = DirBlock::new();
        self.read_block(blk, util::reinterpret_mut(&mut table));
        table
    }

    /// Writes a directory table back to block `blk`.
    pub(crate) fn write_dir_block(&mut self, blk: u32, table: &DirBlock) {
        self.write_block(blk, util::reinterpret(table));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_scan() {
        let mut table = DirBlock::new();
        assert!(table.is_empty());
        assert_eq!(table.free_slot(), Some(0));
        assert!(table.find("a").is_none());

        table.entry_mut(0).set(2, "a", false);
        table.entry_mut(1).set(3, "b", true);
        assert!(!table.is_empty());
        assert_eq!(table.free_slot(), Some(2));
        assert_eq!(table.find("a").map(DirEntry::inode), Some(2));
        assert_eq!(table.find("b").map(DirEntry::is_dir), Some(true));
        assert_eq!(table.valid_entries().count(), 2);

        if let Some(entry) = table.find_mut("a") {
            entry.clear();
        }
        assert_eq!(table.free_slot(), Some(0));
        assert!(table.find("a").is_none());
    }

    #[test]
    fn table_fills_up() {
        let mut table = DirBlock::new();
        for i in 0..DIRENTS_PER_BLOCK {
            let slot = table.free_slot().unwrap();
            table.entry_mut(slot).set(i as u32 + 2, &format!("f{i}"), false);
        }
        assert_eq!(table.free_slot(), None);
    }
}

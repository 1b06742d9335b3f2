//! On-disk records and geometry constants.
//!
//! Every record is a plain `repr(C)` struct whose bytes are the on-disk
//! representation, in native byte order. Images are not portable across
//! endianness.

use std::borrow::Cow;
use std::mem::size_of;

/// The filesystem's block size in bytes, equal to the device block size.
pub const BLOCK_SIZE: usize = 1024;
/// The signature stored in the superblock.
pub const MAGIC: u32 = 0x6e61_6e6f;

/// Number of direct block pointers per inode.
pub const N_DIRECT: usize = 6;
/// Size of a directory entry's name field, NUL terminator included.
pub const FILENAME_SIZE: usize = 28;
/// Longest usable entry name.
pub const MAX_NAME_LEN: usize = FILENAME_SIZE - 1;

/// Number of inode records per block of the inode table.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / size_of::<Inode>();
/// Number of entries in a directory's single data block.
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<DirEntry>();
/// Number of block pointers in an indirect block.
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<u32>();

/// Bytes addressable through the direct pointers.
pub const DIRECT_SPAN: usize = N_DIRECT * BLOCK_SIZE;
/// Bytes addressable through the single-indirect tree.
pub const INDIR1_SPAN: usize = PTRS_PER_BLOCK * BLOCK_SIZE;
/// Bytes addressable through the double-indirect tree.
pub const INDIR2_SPAN: usize = PTRS_PER_BLOCK * INDIR1_SPAN;
/// Largest file the index can address.
pub const MAX_FILE_SIZE: usize = DIRECT_SPAN + INDIR1_SPAN + INDIR2_SPAN;

/// The root directory's inode number. Inode 0 is reserved.
pub const ROOT_INODE: u32 = 1;
/// The lowest inode number the allocator hands out.
pub const FIRST_FREE_INODE: u32 = 2;

const SUPERBLOCK_RESERVED: usize = BLOCK_SIZE - 6 * size_of::<u32>() - 16;

/// The superblock, filling all of block 0.
///
/// The remaining regions follow contiguously: inode bitmap, block bitmap,
/// inode table, then the data region. The geometry is written once by the
/// formatter and never changes afterwards.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Superblock {
    /// The filesystem's signature.
    pub magic: u32,
    /// Size of the inode bitmap in blocks.
    pub inode_map_sz: u32,
    /// Size of the block bitmap in blocks.
    pub block_map_sz: u32,
    /// Size of the inode table in blocks.
    pub inode_region_sz: u32,
    /// Total number of blocks of the filesystem.
    pub num_blocks: u32,
    /// The inode number of the root directory.
    pub root_inode: u32,
    /// The volume id, stamped at format time.
    pub fs_id: [u8; 16],

    /// Structure padding.
    _reserved: [u8; SUPERBLOCK_RESERVED],
}

impl Superblock {
    /// Builds a superblock describing the given region sizes.
    pub fn new(
        inode_map_sz: u32,
        block_map_sz: u32,
        inode_region_sz: u32,
        num_blocks: u32,
        fs_id: [u8; 16],
    ) -> Self {
        Self {
            magic: MAGIC,
            inode_map_sz,
            block_map_sz,
            inode_region_sz,
            num_blocks,
            root_inode: ROOT_INODE,
            fs_id,
            _reserved: [0; SUPERBLOCK_RESERVED],
        }
    }
}

/// The file type of an inode, computed once from the mode bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    /// A regular file.
    Regular,
    /// A directory.
    Directory,
}

impl FileType {
    /// Extracts the file type from a mode value, if it names one this
    /// filesystem stores.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & libc::S_IFMT {
            libc::S_IFREG => Some(Self::Regular),
            libc::S_IFDIR => Some(Self::Directory),
            _ => None,
        }
    }
}

/// An inode describes one filesystem object. The name is not part of the
/// inode; it lives in the directory entry referencing it.
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct Inode {
    /// Owner user id.
    pub uid: u16,
    /// Owner group id.
    pub gid: u16,
    /// File type and permission bits.
    pub mode: u32,
    /// Creation timestamp.
    pub ctime: u32,
    /// Timestamp of the last content modification.
    pub mtime: u32,
    /// Size of the content in bytes. Unused for directories.
    pub size: u32,
    /// Direct block pointers. Zero means the slot is unallocated.
    pub direct: [u32; N_DIRECT],
    /// Single-indirect block pointer.
    pub indir_1: u32,
    /// Double-indirect block pointer.
    pub indir_2: u32,

    /// Structure padding.
    _reserved: [u32; 3],
}

impl Inode {
    /// Returns the file type stored in the mode bits.
    pub fn file_type(&self) -> FileType {
        if self.mode & libc::S_IFMT == libc::S_IFDIR {
            FileType::Directory
        } else {
            FileType::Regular
        }
    }

    /// Tells whether the inode is a directory.
    pub fn is_directory(&self) -> bool {
        self.file_type() == FileType::Directory
    }
}

const ENTRY_VALID: u32 = 1 << 31;
const ENTRY_DIR: u32 = 1 << 30;
const ENTRY_INODE_MASK: u32 = ENTRY_DIR - 1;

/// A directory entry: one fixed-size slot of a directory's data block.
///
/// The validity flag, the is-directory flag and the inode number are
/// packed into the leading word; an all-zero slot is invalid and free for
/// reuse.
#[derive(Clone, Copy, Default)]
#[repr(C)]
pub struct DirEntry {
    /// Validity flag, is-directory flag and inode number, packed.
    bits: u32,
    /// NUL-terminated entry name.
    name: [u8; FILENAME_SIZE],
}

impl DirEntry {
    /// Tells whether the slot holds a live entry.
    pub fn is_valid(&self) -> bool {
        self.bits & ENTRY_VALID != 0
    }

    /// Tells whether the entry references a directory.
    pub fn is_dir(&self) -> bool {
        self.bits & ENTRY_DIR != 0
    }

    /// The referenced inode number.
    pub fn inode(&self) -> u32 {
        self.bits & ENTRY_INODE_MASK
    }

    /// The name bytes up to the NUL terminator.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(FILENAME_SIZE);
        &self.name[..len]
    }

    /// The entry name for reporting.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    /// Fills the slot. The caller has checked the name length.
    pub fn set(&mut self, inode: u32, name: &str, is_dir: bool) {
        let mut bits = ENTRY_VALID | (inode & ENTRY_INODE_MASK);
        if is_dir {
            bits |= ENTRY_DIR;
        }
        self.bits = bits;
        self.set_name(name);
    }

    /// Overwrites the name, keeping the rest of the entry.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; FILENAME_SIZE];
        self.name[..name.len()].copy_from_slice(name.as_bytes());
    }

    /// Zeroes the slot, freeing it for reuse.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

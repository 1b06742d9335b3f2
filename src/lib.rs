//! A small POSIX-style hierarchical filesystem stored in a single
//! fixed-size block image.
//!
//! The image is divided into contiguous regions, starting at block 0:
//! - Superblock: one block of geometry describing the other regions
//! - Inode bitmap: one bit per inode, set when the inode is allocated
//! - Block bitmap: one bit per block, set when the block is in use
//! - Inode table: packed 64-byte inode records
//! - Data region: file data, directory blocks and indirect index blocks
//!
//! A file's content is addressed through a three-level index: 6 direct
//! block pointers in the inode, one single-indirect block of 256 pointers,
//! and one double-indirect block of pointers to further indirect blocks.
//! Directories are a single data block holding a fixed array of 32-byte
//! entries.
//!
//! [`FileSystem::mount`] reads the superblock, bitmaps and inode table
//! into memory and exposes the operation set a mount framework dispatches
//! to: attribute and namespace operations, byte-range reads and writes,
//! and statistics. Errors carry an errno value for the host boundary.
//! [`mkfs::Format`] builds a fresh image.

pub mod bitmap;
pub mod device;
pub mod error;
pub mod fs;
pub mod layout;
pub mod mkfs;
mod util;

pub use error::Error;
pub use fs::{FileSystem, Stat, Statfs};
pub use layout::FileType;

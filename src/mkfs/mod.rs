//! Builds a fresh filesystem image on a block device.

use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::layout::BLOCK_SIZE;
use crate::layout::INODES_PER_BLOCK;
use crate::layout::Inode;
use crate::layout::MAGIC;
use crate::layout::ROOT_INODE;
use crate::layout::Superblock;
use crate::util;
use std::io;
use std::mem;
use uuid::Uuid;

/// The default ratio of blocks to inodes.
const DEFAULT_INODE_RATIO: u32 = 4;

/// Options for creating a filesystem image.
///
/// Unset fields fall back to defaults derived from the device.
#[derive(Default)]
pub struct Format {
    /// Number of blocks of the filesystem; the whole device if unset.
    pub num_blocks: Option<u32>,
    /// Number of inodes, rounded up to a full table block; one per
    /// `DEFAULT_INODE_RATIO` blocks if unset.
    pub num_inodes: Option<u32>,
    /// The volume id; random if unset.
    pub fs_id: Option<[u8; 16]>,
}

impl Format {
    /// Tells whether a filesystem is already present on `dev`.
    pub fn is_present<D: BlockDevice>(&self, dev: &mut D) -> io::Result<bool> {
        let mut sb: Superblock = unsafe { mem::zeroed() };
        dev.read(0, 1, util::reinterpret_mut(&mut sb))?;
        Ok(sb.magic == MAGIC)
    }

    /// Creates the filesystem on `dev`: superblock, bitmaps, inode table
    /// and the root directory.
    pub fn create<D: BlockDevice>(&self, dev: &mut D) -> io::Result<()> {
        let num_blocks = self.num_blocks.unwrap_or_else(|| dev.block_count());
        let num_inodes = self
            .num_inodes
            .unwrap_or(num_blocks / DEFAULT_INODE_RATIO)
            .next_multiple_of(INODES_PER_BLOCK as u32)
            .max(INODES_PER_BLOCK as u32);

        let inode_map_sz = num_inodes.div_ceil((BLOCK_SIZE * 8) as u32);
        let block_map_sz = num_blocks.div_ceil((BLOCK_SIZE * 8) as u32);
        let inode_region_sz = num_inodes / INODES_PER_BLOCK as u32;

        let inode_map_base = 1;
        let block_map_base = inode_map_base + inode_map_sz;
        let inode_base = block_map_base + block_map_sz;
        let data_base = inode_base + inode_region_sz;
        // The data region must at least hold the root directory block.
        if data_base >= num_blocks || num_blocks > dev.block_count() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "device too small for the requested geometry",
            ));
        }

        let fs_id = self.fs_id.unwrap_or_else(|| *Uuid::new_v4().as_bytes());
        let sb = Superblock::new(inode_map_sz, block_map_sz, inode_region_sz, num_blocks, fs_id);

        let root_blk = data_base;

        let mut inode_map = Bitmap::new(inode_map_sz as usize * BLOCK_SIZE);
        inode_map.set(0);
        inode_map.set(ROOT_INODE);

        let mut block_map = Bitmap::new(block_map_sz as usize * BLOCK_SIZE);
        for blk in 0..=root_blk {
            block_map.set(blk);
        }

        let timestamp = util::get_timestamp().as_secs() as u32;
        let mut inodes = vec![Inode::default(); num_inodes as usize];
        let root = &mut inodes[ROOT_INODE as usize];
        root.mode = libc::S_IFDIR | 0o755;
        root.ctime = timestamp;
        root.mtime = timestamp;
        root.direct[0] = root_blk;

        dev.write(0, 1, util::reinterpret(&sb))?;
        dev.write(inode_map_base, inode_map_sz, inode_map.as_bytes())?;
        dev.write(block_map_base, block_map_sz, block_map.as_bytes())?;
        dev.write(
            inode_base,
            inode_region_sz,
            util::reinterpret_slice(&inodes),
        )?;
        // The root directory starts with every slot invalid.
        dev.write(root_blk, 1, &[0u8; BLOCK_SIZE])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::MemDevice;
    use crate::fs::FileSystem;

    #[test]
    fn format_and_mount() {
        let mut dev = MemDevice::new(128);
        let factory = Format::default();
        assert!(!factory.is_present(&mut dev).unwrap());
        factory.create(&mut dev).unwrap();
        assert!(factory.is_present(&mut dev).unwrap());

        let mut fs = FileSystem::mount(dev).unwrap();
        let root = fs.getattr("/").unwrap();
        assert_eq!(root.mode & libc::S_IFMT, libc::S_IFDIR);
        assert_eq!(root.nlink, 1);
        fs.readdir("/", |_, _| panic!("fresh root must be empty"))
            .unwrap();
    }

    #[test]
    fn format_rejects_tiny_device() {
        let mut dev = MemDevice::new(2);
        assert!(Format::default().create(&mut dev).is_err());
    }

    #[test]
    fn format_keeps_volume_id() {
        let id = [7u8; 16];
        let mut dev = MemDevice::new(64);
        Format {
            fs_id: Some(id),
            ..Default::default()
        }
        .create(&mut dev)
        .unwrap();

        let mut sb: Superblock = unsafe { mem::zeroed() };
        dev.read(0, 1, util::reinterpret_mut(&mut sb)).unwrap();
        assert_eq!(sb.fs_id, id);
    }
}

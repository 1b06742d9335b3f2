//! The mounted filesystem: context, inode table and allocator.

mod dir;
mod index;
mod ops;
mod path;

pub use ops::Stat;
pub use ops::Statfs;

use crate::bitmap::Bitmap;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::error::fatal;
use crate::layout::BLOCK_SIZE;
use crate::layout::FIRST_FREE_INODE;
use crate::layout::INODES_PER_BLOCK;
use crate::layout::Inode;
use crate::layout::MAGIC;
use crate::layout::Superblock;
use crate::util;
use std::io;
use std::mem;

/// Static layout of the image, derived from the superblock at mount.
#[derive(Clone, Copy)]
struct Geometry {
    /// First block of the inode bitmap region.
    inode_map_base: u32,
    inode_map_sz: u32,
    /// First block of the block bitmap region.
    block_map_base: u32,
    block_map_sz: u32,
    /// First block of the inode table.
    inode_base: u32,
    inode_region_sz: u32,
    /// First block of the data region.
    data_base: u32,
    /// Total number of blocks of the filesystem.
    num_blocks: u32,
    /// Number of inode records in the table.
    n_inodes: u32,
    /// The root directory's inode number.
    root_inode: u32,
}

impl Geometry {
    fn from_superblock(sb: &Superblock) -> io::Result<Self> {
        let inode_map_base = 1;
        let block_map_base = inode_map_base + sb.inode_map_sz;
        let inode_base = block_map_base + sb.block_map_sz;
        let data_base = inode_base + sb.inode_region_sz;
        let n_inodes = sb.inode_region_sz * INODES_PER_BLOCK as u32;
        if data_base >= sb.num_blocks || sb.root_inode >= n_inodes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "inconsistent superblock geometry",
            ));
        }
        Ok(Self {
            inode_map_base,
            inode_map_sz: sb.inode_map_sz,
            block_map_base,
            block_map_sz: sb.block_map_sz,
            inode_base,
            inode_region_sz: sb.inode_region_sz,
            data_base,
            num_blocks: sb.num_blocks,
            n_inodes,
            root_inode: sb.root_inode,
        })
    }
}

/// A mounted filesystem.
///
/// Holds the device, the geometry read once at mount, and the in-memory
/// mirrors of the bitmaps and the inode table. All operations go through
/// this context; it is torn down by [`FileSystem::unmount`].
pub struct FileSystem<D: BlockDevice> {
    dev: D,
    geom: Geometry,
    inode_map: Bitmap,
    block_map: Bitmap,
    inodes: Vec<Inode>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Mounts the filesystem stored on `dev`.
    ///
    /// Reads the superblock, the bitmaps and the inode table; fails if the
    /// signature does not match or any read fails. The geometry is
    /// immutable afterwards.
    pub fn mount(mut dev: D) -> io::Result<Self> {
        let mut sb: Superblock = unsafe { mem::zeroed() };
        dev.read(0, 1, util::reinterpret_mut(&mut sb))?;
        if sb.magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad filesystem signature",
            ));
        }
        let geom = Geometry::from_superblock(&sb)?;

        let mut inode_map = Bitmap::new(geom.inode_map_sz as usize * BLOCK_SIZE);
        dev.read(geom.inode_map_base, geom.inode_map_sz, inode_map.as_bytes_mut())?;

        let mut block_map = Bitmap::new(geom.block_map_sz as usize * BLOCK_SIZE);
        dev.read(geom.block_map_base, geom.block_map_sz, block_map.as_bytes_mut())?;

        let mut inodes = vec![Inode::default(); geom.n_inodes as usize];
        dev.read(
            geom.inode_base,
            geom.inode_region_sz,
            util::reinterpret_slice_mut(&mut inodes),
        )?;

        Ok(Self {
            dev,
            geom,
            inode_map,
            block_map,
            inodes,
        })
    }

    /// Unmounts, giving the device back.
    pub fn unmount(self) -> D {
        self.dev
    }

    /// The root directory's inode number.
    pub(crate) fn root_inode(&self) -> u32 {
        self.geom.root_inode
    }

    /// A copy of inode `i` from the in-memory table.
    pub(crate) fn inode(&self, i: u32) -> Inode {
        self.inodes[i as usize]
    }

    /// Updates inode `i` in the table and writes it back to disk.
    ///
    /// The whole containing block is rewritten from the mirror so the
    /// neighbour inodes are preserved.
    pub(crate) fn put_inode(&mut self, i: u32, ino: &Inode) {
        self.inodes[i as usize] = *ino;
        let blk_index = i as usize / INODES_PER_BLOCK;
        let start = blk_index * INODES_PER_BLOCK;
        let mut blkbuf = [Inode::default(); INODES_PER_BLOCK];
        blkbuf.copy_from_slice(&self.inodes[start..start + INODES_PER_BLOCK]);
        self.write_block(
            self.geom.inode_base + blk_index as u32,
            util::reinterpret_slice(&blkbuf),
        );
    }

    /// Allocates the lowest-numbered free inode.
    pub(crate) fn alloc_inode(&mut self) -> Result<u32, Error> {
        let i = self
            .inode_map
            .find_first_clear(FIRST_FREE_INODE, self.geom.n_inodes)
            .ok_or(Error::NoSpace)?;
        self.inode_map.set(i);
        Ok(i)
    }

    /// Allocates the lowest-numbered free block and zeroes it on disk, so
    /// stale contents never leak.
    pub(crate) fn alloc_block(&mut self) -> Result<u32, Error> {
        let blk = self
            .block_map
            .find_first_clear(0, self.geom.num_blocks)
            .ok_or(Error::NoSpace)?;
        self.block_map.set(blk);
        self.write_block(blk, &[0u8; BLOCK_SIZE]);
        Ok(blk)
    }

    /// Releases inode `i`.
    pub(crate) fn free_inode(&mut self, i: u32) {
        self.inode_map.clear(i);
    }

    /// Releases block `blk`.
    pub(crate) fn free_block(&mut self, blk: u32) {
        self.block_map.clear(blk);
    }

    /// Writes both bitmaps back to their on-disk regions.
    ///
    /// Every metadata-mutating operation flushes before returning success,
    /// so the mirrors and the image always agree between operations.
    pub(crate) fn flush_maps(&mut self) {
        let geom = self.geom;
        if let Err(e) = self
            .dev
            .write(geom.inode_map_base, geom.inode_map_sz, self.inode_map.as_bytes())
        {
            fatal(format_args!("writing the inode bitmap failed: {e}"));
        }
        if let Err(e) = self
            .dev
            .write(geom.block_map_base, geom.block_map_sz, self.block_map.as_bytes())
        {
            fatal(format_args!("writing the block bitmap failed: {e}"));
        }
    }

    /// Number of inode records in the table.
    pub(crate) fn inode_count(&self) -> u32 {
        self.geom.n_inodes
    }

    /// Number of blocks in the data region.
    pub(crate) fn data_block_count(&self) -> u32 {
        self.geom.num_blocks - self.geom.data_base
    }

    /// Number of free inodes.
    pub(crate) fn free_inode_count(&self) -> u32 {
        self.inode_map.count_clear(self.geom.n_inodes)
    }

    /// Number of free blocks.
    pub(crate) fn free_block_count(&self) -> u32 {
        self.block_map.count_clear(self.geom.num_blocks)
    }

    /// Reads one block. Device failures are fatal.
    pub(crate) fn read_block(&mut self, blk: u32, buf: &mut [u8]) {
        if let Err(e) = self.dev.read(blk, 1, buf) {
            fatal(format_args!("reading block {blk} failed: {e}"));
        }
    }

    /// Writes one block. Device failures are fatal.
    pub(crate) fn write_block(&mut self, blk: u32, buf: &[u8]) {
        if let Err(e) = self.dev.write(blk, 1, buf) {
            fatal(format_args!("writing block {blk} failed: {e}"));
        }
    }
}

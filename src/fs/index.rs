//! The block index walker: byte-range access to a file's content through
//! the direct, single-indirect and double-indirect pointers.

use super::FileSystem;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::layout::BLOCK_SIZE;
use crate::layout::DIRECT_SPAN;
use crate::layout::INDIR1_SPAN;
use crate::layout::Inode;
use crate::layout::MAX_FILE_SIZE;
use crate::layout::N_DIRECT;
use crate::layout::PTRS_PER_BLOCK;
use crate::util;
use std::cmp::min;

/// An indirect block: a flat array of block pointers.
type PtrBlock = [u32; PTRS_PER_BLOCK];

impl<D: BlockDevice> FileSystem<D> {
    fn read_ptr_block(&mut self, blk: u32) -> PtrBlock {
        let mut ptrs = [0u32; PTRS_PER_BLOCK];
        self.read_block(blk, util::reinterpret_mut(&mut ptrs));
        ptrs
    }

    fn write_ptr_block(&mut self, blk: u32, ptrs: &PtrBlock) {
        self.write_block(blk, util::reinterpret(ptrs));
    }

    /// Reads up to `buf.len()` bytes of inode `inum` starting at byte
    /// offset `off`, returning the number of bytes copied.
    ///
    /// The length is clipped to the file size. A zero pointer inside the
    /// range ends the read early.
    pub(crate) fn read_file(&mut self, inum: u32, off: u64, buf: &mut [u8]) -> usize {
        let ino = self.inode(inum);
        let size = ino.size as u64;
        if off >= size {
            return 0;
        }
        let len = min(buf.len() as u64, size - off) as usize;
        let mut pos = off as usize;
        let mut copied = 0;

        if copied < len && pos < DIRECT_SPAN {
            let want = min(len - copied, DIRECT_SPAN - pos);
            let n = self.read_direct(&ino, pos, &mut buf[copied..copied + want]);
            copied += n;
            pos += n;
            if n < want {
                return copied;
            }
        }
        if copied < len && pos < DIRECT_SPAN + INDIR1_SPAN {
            if ino.indir_1 == 0 {
                return copied;
            }
            let want = min(len - copied, DIRECT_SPAN + INDIR1_SPAN - pos);
            let n = self.read_indir1(ino.indir_1, pos - DIRECT_SPAN, &mut buf[copied..copied + want]);
            copied += n;
            pos += n;
            if n < want {
                return copied;
            }
        }
        if copied < len && pos < MAX_FILE_SIZE {
            if ino.indir_2 == 0 {
                return copied;
            }
            let want = min(len - copied, MAX_FILE_SIZE - pos);
            let n = self.read_indir2(
                ino.indir_2,
                pos - DIRECT_SPAN - INDIR1_SPAN,
                &mut buf[copied..copied + want],
            );
            copied += n;
        }
        copied
    }

    fn read_direct(&mut self, ino: &Inode, pos: usize, buf: &mut [u8]) -> usize {
        let mut idx = pos / BLOCK_SIZE;
        let mut blk_off = pos % BLOCK_SIZE;
        let mut copied = 0;
        while idx < N_DIRECT && copied < buf.len() {
            let blk = ino.direct[idx];
            if blk == 0 {
                break;
            }
            let chunk = min(buf.len() - copied, BLOCK_SIZE - blk_off);
            let mut tmp = [0u8; BLOCK_SIZE];
            self.read_block(blk, &mut tmp);
            buf[copied..copied + chunk].copy_from_slice(&tmp[blk_off..blk_off + chunk]);
            copied += chunk;
            idx += 1;
            blk_off = 0;
        }
        copied
    }

    fn read_indir1(&mut self, indir: u32, pos: usize, buf: &mut [u8]) -> usize {
        let ptrs = self.read_ptr_block(indir);
        let mut idx = pos / BLOCK_SIZE;
        let mut blk_off = pos % BLOCK_SIZE;
        let mut copied = 0;
        while idx < PTRS_PER_BLOCK && copied < buf.len() {
            let blk = ptrs[idx];
            if blk == 0 {
                break;
            }
            let chunk = min(buf.len() - copied, BLOCK_SIZE - blk_off);
            let mut tmp = [0u8; BLOCK_SIZE];
            self.read_block(blk, &mut tmp);
            buf[copied..copied + chunk].copy_from_slice(&tmp[blk_off..blk_off + chunk]);
            copied += chunk;
            idx += 1;
            blk_off = 0;
        }
        copied
    }

    fn read_indir2(&mut self, indir: u32, pos: usize, buf: &mut [u8]) -> usize {
        let outer = self.read_ptr_block(indir);
        let mut idx = pos / INDIR1_SPAN;
        let mut inner_off = pos % INDIR1_SPAN;
        let mut copied = 0;
        while idx < PTRS_PER_BLOCK && copied < buf.len() {
            let blk = outer[idx];
            if blk == 0 {
                break;
            }
            let chunk = min(buf.len() - copied, INDIR1_SPAN - inner_off);
            let n = self.read_indir1(blk, inner_off, &mut buf[copied..copied + chunk]);
            copied += n;
            if n < chunk {
                break;
            }
            idx += 1;
            inner_off = 0;
        }
        copied
    }

    /// Writes `buf` into inode `inum` at byte offset `off`, allocating
    /// data and index blocks as needed, and returns the number of bytes
    /// written.
    ///
    /// Writing past the current end of file is refused; the format has no
    /// holes. When an allocation fails mid-way, the prefix written so far
    /// is returned.
    pub(crate) fn write_file(&mut self, inum: u32, off: u64, buf: &[u8]) -> Result<usize, Error> {
        let mut ino = self.inode(inum);
        let size = ino.size as u64;
        if off > size {
            return Err(Error::InvalidArgument);
        }
        let len = min(buf.len() as u64, (MAX_FILE_SIZE as u64).saturating_sub(off)) as usize;
        let mut pos = off as usize;
        let mut written = 0;

        'regions: {
            if written < len && pos < DIRECT_SPAN {
                let want = min(len - written, DIRECT_SPAN - pos);
                let n = self.write_direct(inum, &mut ino, pos, &buf[written..written + want]);
                written += n;
                pos += n;
                if n < want {
                    break 'regions;
                }
            }
            if written < len && pos < DIRECT_SPAN + INDIR1_SPAN {
                if ino.indir_1 == 0 {
                    match self.alloc_block() {
                        Ok(blk) => {
                            ino.indir_1 = blk;
                            self.put_inode(inum, &ino);
                            self.flush_maps();
                        }
                        Err(_) => break 'regions,
                    }
                }
                let want = min(len - written, DIRECT_SPAN + INDIR1_SPAN - pos);
                let n =
                    self.write_indir1(ino.indir_1, pos - DIRECT_SPAN, &buf[written..written + want]);
                written += n;
                pos += n;
                if n < want {
                    break 'regions;
                }
            }
            if written < len && pos < MAX_FILE_SIZE {
                if ino.indir_2 == 0 {
                    match self.alloc_block() {
                        Ok(blk) => {
                            ino.indir_2 = blk;
                            self.put_inode(inum, &ino);
                            self.flush_maps();
                        }
                        Err(_) => break 'regions,
                    }
                }
                let want = min(len - written, MAX_FILE_SIZE - pos);
                let n = self.write_indir2(
                    ino.indir_2,
                    pos - DIRECT_SPAN - INDIR1_SPAN,
                    &buf[written..written + want],
                );
                written += n;
            }
        }

        let end = off + written as u64;
        if end > size {
            ino.size = end as u32;
            self.put_inode(inum, &ino);
        }
        Ok(written)
    }

    fn write_direct(&mut self, inum: u32, ino: &mut Inode, pos: usize, buf: &[u8]) -> usize {
        let mut idx = pos / BLOCK_SIZE;
        let mut blk_off = pos % BLOCK_SIZE;
        let mut written = 0;
        while idx < N_DIRECT && written < buf.len() {
            if ino.direct[idx] == 0 {
                match self.alloc_block() {
                    Ok(blk) => {
                        ino.direct[idx] = blk;
                        self.put_inode(inum, ino);
                        self.flush_maps();
                    }
                    Err(_) => return written,
                }
            }
            let chunk = min(buf.len() - written, BLOCK_SIZE - blk_off);
            let blk = ino.direct[idx];
            let mut tmp = [0u8; BLOCK_SIZE];
            self.read_block(blk, &mut tmp);
            tmp[blk_off..blk_off + chunk].copy_from_slice(&buf[written..written + chunk]);
            self.write_block(blk, &tmp);
            written += chunk;
            idx += 1;
            blk_off = 0;
        }
        written
    }

    fn write_indir1(&mut self, indir: u32, pos: usize, buf: &[u8]) -> usize {
        let mut ptrs = self.read_ptr_block(indir);
        let mut idx = pos / BLOCK_SIZE;
        let mut blk_off = pos % BLOCK_SIZE;
        let mut written = 0;
        while idx < PTRS_PER_BLOCK && written < buf.len() {
            if ptrs[idx] == 0 {
                match self.alloc_block() {
                    Ok(blk) => {
                        ptrs[idx] = blk;
                        self.write_ptr_block(indir, &ptrs);
                        self.flush_maps();
                    }
                    Err(_) => return written,
                }
            }
            let chunk = min(buf.len() - written, BLOCK_SIZE - blk_off);
            let blk = ptrs[idx];
            let mut tmp = [0u8; BLOCK_SIZE];
            self.read_block(blk, &mut tmp);
            tmp[blk_off..blk_off + chunk].copy_from_slice(&buf[written..written + chunk]);
            self.write_block(blk, &tmp);
            written += chunk;
            idx += 1;
            blk_off = 0;
        }
        written
    }

    fn write_indir2(&mut self, indir: u32, pos: usize, buf: &[u8]) -> usize {
        let mut outer = self.read_ptr_block(indir);
        let mut idx = pos / INDIR1_SPAN;
        let mut inner_off = pos % INDIR1_SPAN;
        let mut written = 0;
        while idx < PTRS_PER_BLOCK && written < buf.len() {
            if outer[idx] == 0 {
                match self.alloc_block() {
                    Ok(blk) => {
                        outer[idx] = blk;
                        self.write_ptr_block(indir, &outer);
                        self.flush_maps();
                    }
                    Err(_) => return written,
                }
            }
            let chunk = min(buf.len() - written, INDIR1_SPAN - inner_off);
            let n = self.write_indir1(outer[idx], inner_off, &buf[written..written + chunk]);
            written += n;
            if n < chunk {
                return written;
            }
            idx += 1;
            inner_off = 0;
        }
        written
    }

    /// Releases every data and index block of inode `inum`, zeroes its
    /// pointers and size, and writes the result back.
    pub(crate) fn release_blocks(&mut self, inum: u32) {
        let mut ino = self.inode(inum);
        for d in &mut ino.direct {
            if *d != 0 {
                self.free_block(*d);
                *d = 0;
            }
        }
        if ino.indir_1 != 0 {
            self.release_indir1(ino.indir_1);
            ino.indir_1 = 0;
        }
        if ino.indir_2 != 0 {
            self.release_indir2(ino.indir_2);
            ino.indir_2 = 0;
        }
        ino.size = 0;
        self.flush_maps();
        self.put_inode(inum, &ino);
    }

    fn release_indir1(&mut self, indir: u32) {
        let ptrs = self.read_ptr_block(indir);
        for blk in ptrs {
            if blk != 0 {
                self.free_block(blk);
            }
        }
        self.free_block(indir);
    }

    fn release_indir2(&mut self, indir: u32) {
        let outer = self.read_ptr_block(indir);
        for blk in outer {
            if blk != 0 {
                self.release_indir1(blk);
            }
        }
        self.free_block(indir);
    }

    /// Collects every block number reachable from inode `inum`, index
    /// blocks included.
    #[cfg(test)]
    pub(crate) fn reachable_blocks(&mut self, inum: u32) -> Vec<u32> {
        let ino = self.inode(inum);
        let mut blocks = Vec::new();
        for blk in ino.direct {
            if blk != 0 {
                blocks.push(blk);
            }
        }
        if ino.indir_1 != 0 {
            blocks.push(ino.indir_1);
            for blk in self.read_ptr_block(ino.indir_1) {
                if blk != 0 {
                    blocks.push(blk);
                }
            }
        }
        if ino.indir_2 != 0 {
            blocks.push(ino.indir_2);
            for inner in self.read_ptr_block(ino.indir_2) {
                if inner != 0 {
                    blocks.push(inner);
                    for blk in self.read_ptr_block(inner) {
                        if blk != 0 {
                            blocks.push(blk);
                        }
                    }
                }
            }
        }
        blocks
    }
}

//! The user-visible operation set.
//!
//! Each operation resolves a path, performs its work, and reports either
//! success or one error of the taxonomy in [`crate::error`]. A mount
//! framework dispatches to these methods one request at a time; the
//! context takes no locks of its own.

use super::FileSystem;
use super::path;
use crate::device::BlockDevice;
use crate::error::Error;
use crate::layout::BLOCK_SIZE;
use crate::layout::FileType;
use crate::layout::Inode;
use crate::layout::MAX_NAME_LEN;
use crate::util;

/// File attributes, as reported by [`FileSystem::getattr`] and the
/// readdir filler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stat {
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// File type and permission bits.
    pub mode: u32,
    /// Size in bytes.
    pub size: u64,
    /// Access timestamp; the format stores none, so this mirrors `mtime`.
    pub atime: u32,
    /// Timestamp of the last content modification.
    pub mtime: u32,
    /// Change timestamp; mirrors `mtime`.
    pub ctime: u32,
    /// Number of hard links, always 1.
    pub nlink: u32,
    /// Number of blocks covered by `size`.
    pub blocks: u64,
}

/// Filesystem statistics, as reported by [`FileSystem::statfs`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Statfs {
    /// The block size in bytes.
    pub block_size: u32,
    /// Blocks in the data region.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Free blocks available to unprivileged users; equals `bfree`.
    pub bavail: u64,
    /// Inode records in the table.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Longest usable entry name.
    pub name_max: u32,
}

impl<D: BlockDevice> FileSystem<D> {
    fn stat_of(&self, inum: u32) -> Stat {
        let ino = self.inode(inum);
        Stat {
            uid: ino.uid as u32,
            gid: ino.gid as u32,
            mode: ino.mode,
            size: ino.size as u64,
            atime: ino.mtime,
            mtime: ino.mtime,
            ctime: ino.mtime,
            nlink: 1,
            blocks: (ino.size as u64).div_ceil(BLOCK_SIZE as u64),
        }
    }

    /// Returns the attributes of the object at `path`.
    pub fn getattr(&mut self, path: &str) -> Result<Stat, Error> {
        let inum = self.lookup(path)?;
        Ok(self.stat_of(inum))
    }

    /// Calls `filler` with the name and attributes of every entry of the
    /// directory at `path`.
    pub fn readdir<F: FnMut(&str, &Stat)>(
        &mut self,
        path: &str,
        mut filler: F,
    ) -> Result<(), Error> {
        let inum = self.lookup(path)?;
        let ino = self.inode(inum);
        if !ino.is_directory() {
            return Err(Error::NotDirectory);
        }
        let table = self.read_dir_block(ino.direct[0]);
        for entry in table.valid_entries() {
            let stat = self.stat_of(entry.inode());
            filler(&entry.name(), &stat);
        }
        Ok(())
    }

    /// Creates a regular file at `path` with the given mode.
    pub fn mknod(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        if FileType::from_mode(mode) != Some(FileType::Regular) {
            return Err(Error::InvalidArgument);
        }
        self.create_node(path, mode, FileType::Regular)
    }

    /// Creates an empty directory at `path`.
    ///
    /// The caller's permission bits are kept; the file-type bits are
    /// forced to directory.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        self.create_node(path, mode, FileType::Directory)
    }

    fn create_node(&mut self, path: &str, mode: u32, kind: FileType) -> Result<(), Error> {
        let (parent, name) = path::split_parent(path)?;
        let dir_inum = self.lookup(parent)?;
        let dir_ino = self.inode(dir_inum);
        if !dir_ino.is_directory() {
            return Err(Error::NotDirectory);
        }
        match self.lookup(path) {
            Ok(_) => return Err(Error::Exists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        let mut table = self.read_dir_block(dir_ino.direct[0]);
        let slot = table.free_slot().ok_or(Error::NoSpace)?;
        let inum = self.alloc_inode()?;

        let now = util::get_timestamp().as_secs() as u32;
        let mut ino = Inode::default();
        ino.uid = unsafe { libc::getuid() } as u16;
        ino.gid = unsafe { libc::getgid() } as u16;
        ino.ctime = now;
        ino.mtime = now;
        match kind {
            FileType::Regular => ino.mode = mode,
            FileType::Directory => {
                ino.mode = (mode & 0o7777) | libc::S_IFDIR;
                // One data block holds the whole entry table.
                match self.alloc_block() {
                    Ok(blk) => ino.direct[0] = blk,
                    Err(e) => {
                        self.free_inode(inum);
                        return Err(e);
                    }
                }
            }
        }

        table
            .entry_mut(slot)
            .set(inum, name, kind == FileType::Directory);
        self.put_inode(inum, &ino);
        self.write_dir_block(dir_ino.direct[0], &table);
        self.flush_maps();
        Ok(())
    }

    /// Removes the regular file at `path`, releasing all of its data.
    pub fn unlink(&mut self, path: &str) -> Result<(), Error> {
        let inum = self.lookup(path)?;
        if self.inode(inum).is_directory() {
            return Err(Error::IsDirectory);
        }
        self.release_blocks(inum);

        let (parent, name) = path::split_parent(path)?;
        let dir_inum = self.lookup(parent)?;
        let dir_blk = self.inode(dir_inum).direct[0];
        let mut table = self.read_dir_block(dir_blk);
        if let Some(entry) = table.find_mut(name) {
            entry.clear();
        }
        self.write_dir_block(dir_blk, &table);

        self.put_inode(inum, &Inode::default());
        self.free_inode(inum);
        self.flush_maps();
        Ok(())
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<(), Error> {
        let (parent, name) = path::split_parent(path)?;
        let dir_inum = self.lookup(parent)?;
        if !self.inode(dir_inum).is_directory() {
            return Err(Error::NotDirectory);
        }
        let inum = self.lookup(path)?;
        let ino = self.inode(inum);
        if !ino.is_directory() {
            return Err(Error::NotDirectory);
        }
        let table = self.read_dir_block(ino.direct[0]);
        if !table.is_empty() {
            return Err(Error::NotEmpty);
        }
        self.free_block(ino.direct[0]);

        let dir_blk = self.inode(dir_inum).direct[0];
        let mut parent_table = self.read_dir_block(dir_blk);
        if let Some(entry) = parent_table.find_mut(name) {
            entry.clear();
        }
        self.write_dir_block(dir_blk, &parent_table);

        self.put_inode(inum, &Inode::default());
        self.free_inode(inum);
        self.flush_maps();
        Ok(())
    }

    /// Renames an entry in place. Source and destination must share the
    /// same parent directory; the inode reference is unchanged.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<(), Error> {
        self.lookup(src)?;
        match self.lookup(dst) {
            Ok(_) => return Err(Error::Exists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        let (src_parent, src_name) = path::split_parent(src)?;
        let (dst_parent, dst_name) = path::split_parent(dst)?;
        if src_parent != dst_parent {
            return Err(Error::InvalidArgument);
        }

        let dir_inum = self.lookup(src_parent)?;
        let dir_blk = self.inode(dir_inum).direct[0];
        let mut table = self.read_dir_block(dir_blk);
        match table.find_mut(src_name) {
            Some(entry) => entry.set_name(dst_name),
            None => return Err(Error::NotFound),
        }
        self.write_dir_block(dir_blk, &table);
        Ok(())
    }

    /// Replaces the permission bits of the object at `path`, keeping its
    /// file-type bits.
    pub fn chmod(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        let inum = self.lookup(path)?;
        let mut ino = self.inode(inum);
        ino.mode = (mode & 0o7777) | (ino.mode & libc::S_IFMT);
        self.put_inode(inum, &ino);
        Ok(())
    }

    /// Sets the modification time of the object at `path`.
    pub fn utime(&mut self, path: &str, mtime: u32) -> Result<(), Error> {
        let inum = self.lookup(path)?;
        let mut ino = self.inode(inum);
        ino.mtime = mtime;
        self.put_inode(inum, &ino);
        Ok(())
    }

    /// Truncates the regular file at `path` to length zero.
    ///
    /// Any other length is refused.
    pub fn truncate(&mut self, path: &str, len: u64) -> Result<(), Error> {
        if len != 0 {
            return Err(Error::InvalidArgument);
        }
        let inum = self.lookup(path)?;
        if self.inode(inum).is_directory() {
            return Err(Error::IsDirectory);
        }
        self.release_blocks(inum);
        Ok(())
    }

    /// Reads from the regular file at `path` into `buf`, starting at
    /// `offset`. Returns the number of bytes read.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize, Error> {
        let inum = self.lookup(path)?;
        if self.inode(inum).is_directory() {
            return Err(Error::IsDirectory);
        }
        Ok(self.read_file(inum, offset, buf))
    }

    /// Writes `buf` to the regular file at `path`, starting at `offset`.
    /// Returns the number of bytes written.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize, Error> {
        let inum = self.lookup(path)?;
        if self.inode(inum).is_directory() {
            return Err(Error::IsDirectory);
        }
        self.write_file(inum, offset, buf)
    }

    /// Reports filesystem statistics.
    pub fn statfs(&self) -> Statfs {
        let bfree = self.free_block_count() as u64;
        Statfs {
            block_size: BLOCK_SIZE as u32,
            blocks: self.data_block_count() as u64,
            bfree,
            bavail: bfree,
            files: self.inode_count() as u64,
            ffree: self.free_inode_count() as u64,
            name_max: MAX_NAME_LEN as u32,
        }
    }

    /// Checks that `path` is a regular file; returns its inode number as
    /// the handle value.
    pub fn open(&mut self, path: &str) -> Result<u32, Error> {
        let inum = self.lookup(path)?;
        if self.inode(inum).is_directory() {
            return Err(Error::IsDirectory);
        }
        Ok(inum)
    }

    /// Checks that `path` is a directory; returns its inode number as the
    /// handle value.
    pub fn opendir(&mut self, path: &str) -> Result<u32, Error> {
        let inum = self.lookup(path)?;
        if !self.inode(inum).is_directory() {
            return Err(Error::NotDirectory);
        }
        Ok(inum)
    }

    /// Validates `path` on release of a file handle.
    pub fn release(&mut self, path: &str) -> Result<(), Error> {
        self.open(path).map(|_| ())
    }

    /// Validates `path` on release of a directory handle.
    pub fn releasedir(&mut self, path: &str) -> Result<(), Error> {
        self.opendir(path).map(|_| ())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::MemDevice;
    use crate::layout::DIRECT_SPAN;
    use crate::layout::DIRENTS_PER_BLOCK;
    use crate::layout::INDIR1_SPAN;
    use crate::mkfs::Format;
    use rand::RngCore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn new_sized_fs(blocks: u32, inodes: u32) -> FileSystem<MemDevice> {
        let mut dev = MemDevice::new(blocks);
        Format {
            num_inodes: Some(inodes),
            ..Default::default()
        }
        .create(&mut dev)
        .unwrap();
        FileSystem::mount(dev).unwrap()
    }

    fn new_fs() -> FileSystem<MemDevice> {
        new_sized_fs(1024, 256)
    }

    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = vec![0u8; len];
        rng.fill_bytes(&mut buf);
        buf
    }

    /// Checks the cross-layer invariants: every live pointer references a
    /// block marked used, no block is referenced twice, and directory
    /// entries agree with the inodes they name.
    fn check_invariants(fs: &mut FileSystem<MemDevice>) {
        let mut seen = HashSet::new();
        for i in 1..fs.inode_count() {
            if !fs.inode_map.test(i) {
                continue;
            }
            for blk in fs.reachable_blocks(i) {
                assert!(fs.block_map.test(blk), "live block {blk} is free in the map");
                assert!(seen.insert(blk), "block {blk} is referenced twice");
            }
            let ino = fs.inode(i);
            if ino.is_directory() {
                let table = fs.read_dir_block(ino.direct[0]);
                for entry in table.valid_entries() {
                    assert!(fs.inode_map.test(entry.inode()));
                    assert_eq!(fs.inode(entry.inode()).is_directory(), entry.is_dir());
                }
            }
        }
    }

    #[test]
    fn create_write_read() {
        let mut fs = new_fs();
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/f", 0o100644).unwrap();

        assert_eq!(fs.write("/a/f", b"hello", 0), Ok(5));
        let mut buf = [0u8; 5];
        assert_eq!(fs.read("/a/f", &mut buf, 0), Ok(5));
        assert_eq!(&buf, b"hello");

        let stat = fs.getattr("/a/f").unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.blocks, 1);
        assert_eq!(stat.mode, 0o100644);
        assert_eq!(stat.nlink, 1);
        check_invariants(&mut fs);
    }

    #[test]
    fn mknod_requires_regular_mode() {
        let mut fs = new_fs();
        assert_eq!(fs.mknod("/f", 0o644), Err(Error::InvalidArgument));
        assert_eq!(
            fs.mknod("/f", libc::S_IFDIR | 0o755),
            Err(Error::InvalidArgument)
        );
        assert_eq!(fs.mknod("/", 0o100644), Err(Error::InvalidArgument));
    }

    #[test]
    fn single_indirect_spill() {
        let mut fs = new_fs();
        fs.mknod("/x", 0o100644).unwrap();

        let data = random_bytes(7000, 1);
        assert_eq!(fs.write("/x", &data, 0), Ok(7000));

        let mut back = vec![0u8; 7000];
        assert_eq!(fs.read("/x", &mut back, 0), Ok(7000));
        assert_eq!(back, data);

        let inum = fs.open("/x").unwrap();
        let ino = fs.inode(inum);
        assert_ne!(ino.indir_1, 0);
        assert_eq!(ino.indir_2, 0);
        check_invariants(&mut fs);
    }

    #[test]
    fn hole_write_rejected() {
        let mut fs = new_fs();
        fs.mknod("/y", 0o100644).unwrap();
        let chunk = random_bytes(1024, 2);
        assert_eq!(fs.write("/y", &chunk, 0), Ok(1024));
        assert_eq!(fs.write("/y", &chunk, 2048), Err(Error::InvalidArgument));
        // Appending exactly at the end of file is not a hole.
        assert_eq!(fs.write("/y", &chunk, 1024), Ok(1024));
    }

    #[test]
    fn directory_capacity() {
        let mut fs = new_fs();
        for i in 0..DIRENTS_PER_BLOCK {
            fs.mknod(&format!("/f{i}"), 0o100644).unwrap();
        }
        assert_eq!(fs.mknod("/overflow", 0o100644), Err(Error::NoSpace));
        check_invariants(&mut fs);
    }

    #[test]
    fn rmdir_semantics() {
        let mut fs = new_fs();
        fs.mkdir("/d", 0o755).unwrap();
        fs.mknod("/d/f", 0o100644).unwrap();

        assert_eq!(fs.rmdir("/d"), Err(Error::NotEmpty));
        fs.unlink("/d/f").unwrap();
        assert_eq!(fs.rmdir("/d"), Ok(()));
        assert_eq!(fs.getattr("/d"), Err(Error::NotFound));
        assert_eq!(fs.rmdir("/"), Err(Error::InvalidArgument));
        check_invariants(&mut fs);
    }

    #[test]
    fn rename_semantics() {
        let mut fs = new_fs();
        fs.mknod("/a", 0o100644).unwrap();
        fs.mknod("/b", 0o100644).unwrap();

        assert_eq!(fs.rename("/a", "/b"), Err(Error::Exists));
        assert_eq!(fs.rename("/a", "/c"), Ok(()));
        assert_eq!(fs.getattr("/a"), Err(Error::NotFound));
        assert!(fs.getattr("/c").is_ok());

        fs.mkdir("/d", 0o755).unwrap();
        assert_eq!(fs.rename("/c", "/d/c"), Err(Error::InvalidArgument));
        assert_eq!(fs.rename("/missing", "/e"), Err(Error::NotFound));
        check_invariants(&mut fs);
    }

    #[test]
    fn rename_preserves_content_and_inode() {
        let mut fs = new_fs();
        fs.mknod("/a", 0o100644).unwrap();
        let data = random_bytes(3000, 3);
        fs.write("/a", &data, 0).unwrap();
        let inum = fs.open("/a").unwrap();

        fs.rename("/a", "/b").unwrap();
        assert_eq!(fs.open("/b"), Ok(inum));
        let mut back = vec![0u8; 3000];
        assert_eq!(fs.read("/b", &mut back, 0), Ok(3000));
        assert_eq!(back, data);
    }

    #[test]
    fn double_indirect_roundtrip() {
        let mut fs = new_fs();
        fs.mknod("/big", 0o100644).unwrap();

        let len = DIRECT_SPAN + INDIR1_SPAN + 3000;
        let data = random_bytes(len, 4);
        assert_eq!(fs.write("/big", &data, 0), Ok(len));
        assert_eq!(fs.getattr("/big").unwrap().size, len as u64);

        let inum = fs.open("/big").unwrap();
        assert_ne!(fs.inode(inum).indir_2, 0);

        let mut back = vec![0u8; len];
        assert_eq!(fs.read("/big", &mut back, 0), Ok(len));
        assert_eq!(back, data);

        // A small read crossing into the double-indirect region.
        let off = DIRECT_SPAN + INDIR1_SPAN - 100;
        let mut window = vec![0u8; 300];
        assert_eq!(fs.read("/big", &mut window, off as u64), Ok(300));
        assert_eq!(window, data[off..off + 300]);
        check_invariants(&mut fs);
    }

    #[test]
    fn overwrite_inside_file() {
        let mut fs = new_fs();
        fs.mknod("/f", 0o100644).unwrap();
        let mut model = random_bytes(2000, 5);
        fs.write("/f", &model, 0).unwrap();

        let patch = random_bytes(400, 6);
        assert_eq!(fs.write("/f", &patch, 500), Ok(400));
        model[500..900].copy_from_slice(&patch);

        let mut back = vec![0u8; 2000];
        assert_eq!(fs.read("/f", &mut back, 0), Ok(2000));
        assert_eq!(back, model);
        assert_eq!(fs.getattr("/f").unwrap().size, 2000);
    }

    #[test]
    fn read_clipped_to_size() {
        let mut fs = new_fs();
        fs.mknod("/f", 0o100644).unwrap();
        fs.write("/f", b"abcdef", 0).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(fs.read("/f", &mut buf, 4), Ok(2));
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(fs.read("/f", &mut buf, 6), Ok(0));
        assert_eq!(fs.read("/f", &mut buf, 100), Ok(0));
    }

    #[test]
    fn disk_fills_up() {
        // 24 blocks, 5 of metadata and root: 19 data blocks left.
        let mut fs = new_sized_fs(24, 16);
        fs.mknod("/f", 0o100644).unwrap();

        let data = random_bytes(25 * 1024, 7);
        // 6 direct blocks, the indirect block, then 12 more data blocks.
        assert_eq!(fs.write("/f", &data, 0), Ok(18 * 1024));
        assert_eq!(fs.getattr("/f").unwrap().size, 18 * 1024);
        assert_eq!(fs.statfs().bfree, 0);

        fs.unlink("/f").unwrap();
        assert_eq!(fs.statfs().bfree, 19);
        check_invariants(&mut fs);
    }

    #[test]
    fn chmod_idempotent() {
        let mut fs = new_fs();
        fs.mknod("/f", 0o100644).unwrap();
        fs.mkdir("/d", 0o755).unwrap();

        fs.chmod("/f", 0o600).unwrap();
        let once = fs.getattr("/f").unwrap();
        fs.chmod("/f", 0o600).unwrap();
        assert_eq!(fs.getattr("/f").unwrap(), once);
        assert_eq!(once.mode, libc::S_IFREG | 0o600);

        fs.chmod("/d", 0o700).unwrap();
        let stat = fs.getattr("/d").unwrap();
        assert_eq!(stat.mode & libc::S_IFMT, libc::S_IFDIR);
        assert_eq!(stat.mode & 0o7777, 0o700);
    }

    #[test]
    fn utime_sets_mtime() {
        let mut fs = new_fs();
        fs.mknod("/f", 0o100644).unwrap();
        fs.utime("/f", 123_456).unwrap();
        let stat = fs.getattr("/f").unwrap();
        assert_eq!(stat.mtime, 123_456);
        assert_eq!(stat.atime, 123_456);
        assert_eq!(stat.ctime, 123_456);
        assert_eq!(fs.utime("/missing", 1), Err(Error::NotFound));
    }

    #[test]
    fn truncate_frees_blocks() {
        let mut fs = new_fs();
        let before = fs.statfs().bfree;
        fs.mknod("/f", 0o100644).unwrap();
        let data = random_bytes(DIRECT_SPAN + 5000, 8);
        fs.write("/f", &data, 0).unwrap();

        let inum = fs.open("/f").unwrap();
        let held = fs.reachable_blocks(inum);
        assert!(!held.is_empty());

        assert_eq!(fs.truncate("/f", 1), Err(Error::InvalidArgument));
        fs.truncate("/f", 0).unwrap();
        assert_eq!(fs.getattr("/f").unwrap().size, 0);
        for blk in held {
            assert!(!fs.block_map.test(blk), "block {blk} still marked used");
        }
        assert_eq!(fs.statfs().bfree, before);
        assert!(fs.reachable_blocks(inum).is_empty());

        fs.mkdir("/d", 0o755).unwrap();
        assert_eq!(fs.truncate("/d", 0), Err(Error::IsDirectory));
        check_invariants(&mut fs);
    }

    #[test]
    fn create_unlink_restores_counts() {
        let mut fs = new_fs();
        let stat = fs.statfs();
        let before = (stat.bfree, stat.ffree);

        fs.mknod("/f", 0o100644).unwrap();
        fs.write("/f", &random_bytes(3000, 9), 0).unwrap();
        fs.unlink("/f").unwrap();

        let stat = fs.statfs();
        assert_eq!((stat.bfree, stat.ffree), before);
        assert_eq!(fs.unlink("/f"), Err(Error::NotFound));

        fs.mkdir("/d", 0o755).unwrap();
        assert_eq!(fs.unlink("/d"), Err(Error::IsDirectory));
    }

    #[test]
    fn mkdir_rmdir_restores_counts() {
        let mut fs = new_fs();
        let stat = fs.statfs();
        let before = (stat.bfree, stat.ffree);

        fs.mkdir("/d", 0o755).unwrap();
        let stat = fs.statfs();
        assert_eq!((stat.bfree, stat.ffree), (before.0 - 1, before.1 - 1));

        fs.rmdir("/d").unwrap();
        let stat = fs.statfs();
        assert_eq!((stat.bfree, stat.ffree), before);
    }

    #[test]
    fn readdir_lists_entries() {
        let mut fs = new_fs();
        fs.mkdir("/d", 0o755).unwrap();
        fs.mknod("/d/a", 0o100644).unwrap();
        fs.mkdir("/d/sub", 0o700).unwrap();
        fs.write("/d/a", b"xy", 0).unwrap();

        let mut listed = Vec::new();
        fs.readdir("/d", |name, stat| listed.push((name.to_owned(), *stat)))
            .unwrap();
        listed.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, "a");
        assert_eq!(listed[0].1.size, 2);
        assert_eq!(listed[1].0, "sub");
        assert_eq!(listed[1].1.mode & libc::S_IFMT, libc::S_IFDIR);

        assert_eq!(fs.readdir("/d/a", |_, _| {}), Err(Error::NotDirectory));
    }

    #[test]
    fn statfs_reports_geometry() {
        let fs = new_fs();
        let stat = fs.statfs();
        assert_eq!(stat.block_size, 1024);
        assert_eq!(stat.name_max, 27);
        assert!(stat.blocks < 1024);
        // Only the root directory block is in use after format.
        assert_eq!(stat.bfree, stat.blocks - 1);
        assert_eq!(stat.bavail, stat.bfree);
        assert_eq!(stat.files, 256);
        assert_eq!(stat.ffree, 254);
    }

    #[test]
    fn open_type_checks() {
        let mut fs = new_fs();
        fs.mknod("/f", 0o100644).unwrap();

        assert!(fs.open("/f").is_ok());
        assert_eq!(fs.open("/"), Err(Error::IsDirectory));
        assert!(fs.opendir("/").is_ok());
        assert_eq!(fs.opendir("/f"), Err(Error::NotDirectory));
        assert_eq!(fs.release("/f"), Ok(()));
        assert_eq!(fs.releasedir("/"), Ok(()));
        assert_eq!(fs.open("/missing"), Err(Error::NotFound));
    }

    #[test]
    fn path_through_file_fails() {
        let mut fs = new_fs();
        fs.mknod("/f", 0o100644).unwrap();
        assert_eq!(fs.getattr("/f/x"), Err(Error::NotDirectory));
        assert_eq!(fs.mknod("/f/x", 0o100644), Err(Error::NotDirectory));
    }

    #[test]
    fn nested_directories() {
        let mut fs = new_fs();
        fs.mkdir("/a", 0o755).unwrap();
        fs.mkdir("/a/b", 0o755).unwrap();
        fs.mkdir("/a/b/c", 0o755).unwrap();
        fs.mknod("/a/b/c/leaf", 0o100644).unwrap();

        fs.write("/a/b/c/leaf", b"deep", 0).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read("/a/b/c/leaf", &mut buf, 0), Ok(4));
        assert_eq!(&buf, b"deep");

        assert_eq!(fs.mkdir("/a/b", 0o755), Err(Error::Exists));
        check_invariants(&mut fs);
    }

    #[test]
    fn invariants_across_mutations() {
        let mut fs = new_fs();
        fs.mkdir("/a", 0o755).unwrap();
        check_invariants(&mut fs);
        fs.mknod("/a/f", 0o100644).unwrap();
        check_invariants(&mut fs);
        fs.write("/a/f", &random_bytes(7000, 10), 0).unwrap();
        check_invariants(&mut fs);
        fs.mknod("/g", 0o100644).unwrap();
        fs.write("/g", &random_bytes(40_000, 11), 0).unwrap();
        check_invariants(&mut fs);
        fs.rename("/g", "/h").unwrap();
        check_invariants(&mut fs);
        fs.truncate("/h", 0).unwrap();
        check_invariants(&mut fs);
        fs.unlink("/a/f").unwrap();
        check_invariants(&mut fs);
        fs.unlink("/h").unwrap();
        fs.rmdir("/a").unwrap();
        check_invariants(&mut fs);
    }
}

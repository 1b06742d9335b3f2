//! Access to the block image backing a filesystem.

use crate::layout::BLOCK_SIZE;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

/// A numbered array of fixed-size blocks with synchronous whole-block I/O.
///
/// Every call moves exactly `count * BLOCK_SIZE` bytes; there is no
/// caching layer in between.
pub trait BlockDevice {
    /// The number of blocks on the device.
    fn block_count(&self) -> u32;

    /// Reads `count` blocks starting at `blk` into `buf`.
    fn read(&mut self, blk: u32, count: u32, buf: &mut [u8]) -> io::Result<()>;

    /// Writes `count` blocks starting at `blk` from `buf`.
    fn write(&mut self, blk: u32, count: u32, buf: &[u8]) -> io::Result<()>;
}

fn check_range(blocks: u32, blk: u32, count: u32, buf_len: usize) -> io::Result<()> {
    if buf_len != count as usize * BLOCK_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "buffer length does not match the block count",
        ));
    }
    if blk.checked_add(count).is_none_or(|end| end > blocks) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "block range outside of the device",
        ));
    }
    Ok(())
}

/// A filesystem image stored in a regular file.
pub struct ImageFile {
    file: File,
    blocks: u32,
}

impl ImageFile {
    /// Opens an existing image, deriving the block count from its length.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            blocks: (len / BLOCK_SIZE as u64) as u32,
        })
    }

    /// Creates a zero-filled image file of `blocks` blocks.
    pub fn create<P: AsRef<Path>>(path: P, blocks: u32) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(blocks as u64 * BLOCK_SIZE as u64)?;
        Ok(Self { file, blocks })
    }
}

impl BlockDevice for ImageFile {
    fn block_count(&self) -> u32 {
        self.blocks
    }

    fn read(&mut self, blk: u32, count: u32, buf: &mut [u8]) -> io::Result<()> {
        check_range(self.blocks, blk, count, buf.len())?;
        self.file
            .seek(SeekFrom::Start(blk as u64 * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)
    }

    fn write(&mut self, blk: u32, count: u32, buf: &[u8]) -> io::Result<()> {
        check_range(self.blocks, blk, count, buf.len())?;
        self.file
            .seek(SeekFrom::Start(blk as u64 * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)
    }
}

/// A RAM-backed image, for use where no backing file is wanted.
pub struct MemDevice {
    data: Vec<u8>,
}

impl MemDevice {
    /// Creates a zero-filled device of `blocks` blocks.
    pub fn new(blocks: u32) -> Self {
        Self {
            data: vec![0; blocks as usize * BLOCK_SIZE],
        }
    }
}

impl BlockDevice for MemDevice {
    fn block_count(&self) -> u32 {
        (self.data.len() / BLOCK_SIZE) as u32
    }

    fn read(&mut self, blk: u32, count: u32, buf: &mut [u8]) -> io::Result<()> {
        check_range(self.block_count(), blk, count, buf.len())?;
        let start = blk as usize * BLOCK_SIZE;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, blk: u32, count: u32, buf: &[u8]) -> io::Result<()> {
        check_range(self.block_count(), blk, count, buf.len())?;
        let start = blk as usize * BLOCK_SIZE;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mem_device_roundtrip() {
        let mut dev = MemDevice::new(4);
        let block = [0xabu8; BLOCK_SIZE];
        dev.write(2, 1, &block).unwrap();

        let mut back = [0u8; BLOCK_SIZE];
        dev.read(2, 1, &mut back).unwrap();
        assert_eq!(back, block);

        dev.read(0, 1, &mut back).unwrap();
        assert_eq!(back, [0u8; BLOCK_SIZE]);
    }

    #[test]
    fn mem_device_bounds() {
        let mut dev = MemDevice::new(2);
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(dev.read(2, 1, &mut buf).is_err());
        assert!(dev.read(0, 3, &mut [0u8; 3 * BLOCK_SIZE]).is_err());
        assert!(dev.read(0, 2, &mut buf).is_err());
    }
}

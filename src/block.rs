//! Block device abstraction and the host-file-backed implementation.
//!
//! Everything above this module speaks only in whole, `BLOCK_SIZE`-byte
//! blocks addressed by a `u16` index, exactly the contract the rest of the
//! library is written against.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size, in bytes, of a single block on a virtual disk.
pub const BLOCK_SIZE: usize = 4096;

/// One block's worth of bytes.
pub type BlockBuf = [u8; BLOCK_SIZE];

/// A block-addressable storage device.
///
/// Implementations transfer exactly one `BLOCK_SIZE`-byte block per call;
/// no partial reads or writes. This is the seam `FileSystem` is generic
/// over, so a host file is the natural implementor but not the only one
/// (an in-memory device is handy for tests that don't want real I/O).
pub trait BlockDevice {
    /// The error type this device's I/O can fail with.
    type Error: core::fmt::Debug;

    /// Total number of blocks on the device.
    fn block_count(&self) -> u16;

    /// Read block `index` into `buf`.
    fn read_block(&mut self, index: u16, buf: &mut BlockBuf) -> Result<(), Self::Error>;

    /// Write `buf` to block `index`.
    fn write_block(&mut self, index: u16, buf: &BlockBuf) -> Result<(), Self::Error>;
}

/// A [`BlockDevice`] backed by a regular file on the host filesystem.
///
/// This is the library's one concrete device: `FileSystem::mount` only
/// takes a path, so something has to turn that path into block-addressed
/// I/O. The device's own open/close lifecycle is modelled by ownership
/// (`open` acquires the file, `Drop` releases it) rather than by separate
/// `open`/`close` methods on the trait.
pub struct FileBlockDevice {
    file: File,
    block_count: u16,
}

impl FileBlockDevice {
    /// Opens `path` as a virtual disk. Fails if the file is missing, or its
    /// length is not a non-zero multiple of [`BLOCK_SIZE`].
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "disk image length is not a non-zero multiple of the block size",
            ));
        }
        let block_count = len / BLOCK_SIZE as u64;
        if block_count > u16::MAX as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "disk image has more blocks than a u16 block index can address",
            ));
        }
        Ok(Self {
            file,
            block_count: block_count as u16,
        })
    }

    fn seek_to(&mut self, index: u16) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    type Error = io::Error;

    fn block_count(&self) -> u16 {
        self.block_count
    }

    fn read_block(&mut self, index: u16, buf: &mut BlockBuf) -> io::Result<()> {
        self.seek_to(index)?;
        self.file.read_exact(buf)
    }

    fn write_block(&mut self, index: u16, buf: &BlockBuf) -> io::Result<()> {
        self.seek_to(index)?;
        self.file.write_all(buf)
    }
}

#[cfg(test)]
pub(crate) mod mem {
    //! An in-memory block device, used by the rest of the test suite so
    //! unit tests don't need to touch the filesystem at all.
    use super::*;

    pub struct MemoryBlockDevice {
        blocks: Vec<BlockBuf>,
    }

    impl MemoryBlockDevice {
        pub fn new(block_count: u16) -> Self {
            Self {
                blocks: vec![[0u8; BLOCK_SIZE]; block_count as usize],
            }
        }
    }

    impl BlockDevice for MemoryBlockDevice {
        type Error = core::convert::Infallible;

        fn block_count(&self) -> u16 {
            self.blocks.len() as u16
        }

        fn read_block(&mut self, index: u16, buf: &mut BlockBuf) -> Result<(), Self::Error> {
            buf.copy_from_slice(&self.blocks[index as usize]);
            Ok(())
        }

        fn write_block(&mut self, index: u16, buf: &BlockBuf) -> Result<(), Self::Error> {
            self.blocks[index as usize].copy_from_slice(buf);
            Ok(())
        }
    }
}

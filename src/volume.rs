//! Volume State: the single owned value bundling every in-memory structure
//! a mounted disk needs (superblock, FAT, root directory, open-file table
//! and bounce buffer), plus the directory operations and informational
//! surface built on top of them.
//!
//! The I/O engine (`read`/`write`) lives in `crate::io` as further methods
//! on [`Volume`], kept in its own module because it's the largest piece.

use core::fmt;
use std::fmt::Display;

use crate::block::{BlockBuf, BlockDevice, BLOCK_SIZE};
use crate::dir;
use crate::error::{diagnose, Error};
use crate::fat::Fat;
use crate::handle::OpenFileTable;
use crate::layout::{parse_root_dir, serialize_root_dir, DirSlot, Superblock, FS_FILE_MAX_COUNT};

/// Free-block / free-slot counts, as reported by `info()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total_blk_count: u16,
    pub fat_blk_count: u8,
    pub rdir_blk: u16,
    pub data_blk: u16,
    pub data_blk_count: u16,
    pub fat_free: u32,
    pub rdir_free: u32,
}

impl Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total_blk_count={}", self.total_blk_count)?;
        writeln!(f, "fat_blk_count={}", self.fat_blk_count)?;
        writeln!(f, "rdir_blk={}", self.rdir_blk)?;
        writeln!(f, "data_blk={}", self.data_blk)?;
        writeln!(f, "data_blk_count={}", self.data_blk_count)?;
        writeln!(f, "fat_free_ratio={}/{}", self.fat_free, self.data_blk_count)?;
        write!(f, "rdir_free_ratio={}/{}", self.rdir_free, FS_FILE_MAX_COUNT)
    }
}

/// Everything a mounted disk needs, bundled into one owned value. The
/// "not mounted" phase is modelled by [`crate::FileSystem`] simply not
/// holding one of these, rather than by a sentinel flag in here.
pub struct Volume<D: BlockDevice> {
    pub(crate) device: D,
    pub(crate) superblock: Superblock,
    pub(crate) fat: Fat,
    pub(crate) dir: [DirSlot; FS_FILE_MAX_COUNT],
    pub(crate) open_files: OpenFileTable,
    pub(crate) bounce: BlockBuf,
}

impl<D: BlockDevice> Volume<D> {
    /// Reads and validates the superblock, FAT and root directory off
    /// `device`, initializing a fresh open-file table.
    pub(crate) fn mount(mut device: D) -> Result<Self, Error<D::Error>> {
        let mut block0 = [0u8; BLOCK_SIZE];
        device.read_block(0, &mut block0).map_err(Error::IoError)?;
        let superblock = Superblock::parse(&block0).ok_or(Error::BadFormat)?;
        if superblock.total_blk_count != device.block_count() {
            return Err(Error::BadSize);
        }

        let mut fat_blocks = Vec::with_capacity(superblock.fat_blk_count as usize);
        for i in 0..superblock.fat_blk_count as u16 {
            let mut buf = [0u8; BLOCK_SIZE];
            device.read_block(1 + i, &mut buf).map_err(Error::IoError)?;
            fat_blocks.push(buf);
        }
        let fat = Fat::parse(&fat_blocks, superblock.data_blk_count);

        let mut rdir_block = [0u8; BLOCK_SIZE];
        device
            .read_block(superblock.rdir_blk, &mut rdir_block)
            .map_err(Error::IoError)?;
        let dir = parse_root_dir(&rdir_block);

        log::info!(
            "mounted volume: {} blocks, {} FAT blocks, {} data blocks",
            superblock.total_blk_count,
            superblock.fat_blk_count,
            superblock.data_blk_count
        );

        Ok(Volume {
            device,
            superblock,
            fat,
            dir,
            open_files: OpenFileTable::new(),
            bounce: [0u8; BLOCK_SIZE],
        })
    }

    /// Flushes the root directory and every FAT block back, in that order.
    /// Fails `Busy` if any handle is still open, leaving the volume mounted
    /// so the caller can close handles and retry.
    pub(crate) fn unmount(&mut self) -> Result<(), Error<D::Error>> {
        if self.open_files.any_open() {
            diagnose("unmount", &Error::<D::Error>::Busy);
            return Err(Error::Busy);
        }
        self.device
            .write_block(self.superblock.rdir_blk, &serialize_root_dir(&self.dir))
            .map_err(Error::IoError)?;
        for (i, block) in self.fat.serialize().iter().enumerate() {
            self.device
                .write_block(1 + i as u16, block)
                .map_err(Error::IoError)?;
        }
        log::info!("unmounted volume");
        Ok(())
    }

    pub fn info(&self) -> Stats {
        Stats {
            total_blk_count: self.superblock.total_blk_count,
            fat_blk_count: self.superblock.fat_blk_count,
            rdir_blk: self.superblock.rdir_blk,
            data_blk: self.superblock.data_blk,
            data_blk_count: self.superblock.data_blk_count,
            fat_free: self.fat.free_count(),
            rdir_free: dir::free_slot_count(&self.dir),
        }
    }

    pub fn ls(&self) -> Vec<dir::Listing> {
        dir::list(&self.dir)
    }

    pub fn create(&mut self, name: &[u8]) -> Result<(), Error<D::Error>> {
        let encoded = dir::encode_name(name).ok_or(Error::BadName)?;
        if dir::find(&self.dir, name).is_some() {
            diagnose("create", &Error::<D::Error>::Exists);
            return Err(Error::Exists);
        }
        let index = match dir::first_empty(&self.dir) {
            Some(i) => i,
            None => {
                diagnose("create", &Error::<D::Error>::Full);
                return Err(Error::Full);
            }
        };
        dir::create_at(&mut self.dir, index, encoded);
        Ok(())
    }

    pub fn delete(&mut self, name: &[u8]) -> Result<(), Error<D::Error>> {
        if dir::encode_name(name).is_none() {
            return Err(Error::BadName);
        }
        let index = dir::find(&self.dir, name).ok_or(Error::NotFound)?;
        if self.open_files.slot_is_open(index) {
            diagnose("delete", &Error::<D::Error>::Busy);
            return Err(Error::Busy);
        }
        let head = self.dir[index].first_data;
        self.fat.free_chain(head);
        dir::clear_at(&mut self.dir, index);
        Ok(())
    }

    pub fn open(&mut self, name: &[u8]) -> Result<usize, Error<D::Error>> {
        if dir::encode_name(name).is_none() {
            return Err(Error::BadName);
        }
        let index = dir::find(&self.dir, name).ok_or(Error::NotFound)?;
        self.open_files.open(index).ok_or(Error::NoFd)
    }

    pub fn close(&mut self, fd: usize) -> Result<(), Error<D::Error>> {
        if self.open_files.close(fd) {
            Ok(())
        } else {
            Err(Error::BadFd)
        }
    }

    pub fn stat(&self, fd: usize) -> Result<u32, Error<D::Error>> {
        let handle = self.open_files.get(fd).ok_or(Error::BadFd)?;
        Ok(self.dir[handle.slot].file_size)
    }

    pub fn lseek(&mut self, fd: usize, offset: u32) -> Result<(), Error<D::Error>> {
        let slot = self.open_files.get(fd).ok_or(Error::BadFd)?.slot;
        let size = self.dir[slot].file_size;
        if offset > size {
            return Err(Error::BadOffset);
        }
        self.open_files.get_mut(fd).unwrap().offset = offset;
        Ok(())
    }
}

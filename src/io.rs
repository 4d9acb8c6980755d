//! I/O Engine: translates positional byte-range read/write into
//! block-aligned transfers through the volume's single bounce buffer,
//! walking the file's FAT chain and allocating on demand as writes grow it.

use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::error::Error;
use crate::layout::FAT_EOC;
use crate::volume::Volume;

impl<D: BlockDevice> Volume<D> {
    /// Reads up to `buf.len()` bytes starting at `fd`'s current offset,
    /// advancing it by the number of bytes actually read. Short reads
    /// (fewer bytes than requested) happen exactly at end-of-file and are
    /// not an error.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, Error<D::Error>> {
        let (slot, offset) = {
            let handle = self.open_files.get(fd).ok_or(Error::BadFd)?;
            (handle.slot, handle.offset)
        };
        let size = self.dir[slot].file_size;
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min((size - offset) as usize);

        let head = self.dir[slot].first_data;
        let mut cur = self.fat.walk(head, offset / BLOCK_SIZE as u32);
        let mut in_block = (offset % BLOCK_SIZE as u32) as usize;
        let mut copied = 0usize;
        let mut remaining = count;

        while remaining > 0 && cur != FAT_EOC {
            self.device
                .read_block(self.superblock.data_blk + cur, &mut self.bounce)
                .map_err(Error::IoError)?;
            let n = remaining.min(BLOCK_SIZE - in_block);
            buf[copied..copied + n].copy_from_slice(&self.bounce[in_block..in_block + n]);
            copied += n;
            remaining -= n;
            in_block = 0;
            cur = self.fat.walk(cur, 1);
        }

        self.open_files.get_mut(fd).unwrap().offset += copied as u32;
        log::trace!("read fd={} copied={} remaining_requested={}", fd, copied, remaining);
        Ok(copied)
    }

    /// Writes `buf` at `fd`'s current offset, allocating new blocks as the
    /// chain grows, and advancing the offset (and the slot's `file_size`,
    /// if the write extends past it) by the number of bytes actually
    /// written. Returns fewer bytes than requested only when the volume
    /// fills mid-write, never an error, per the write-API convention this
    /// format follows.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> Result<usize, Error<D::Error>> {
        if buf.is_empty() {
            return Ok(0);
        }
        let (slot, offset) = {
            let handle = self.open_files.get(fd).ok_or(Error::BadFd)?;
            (handle.slot, handle.offset)
        };

        let mut in_block = (offset % BLOCK_SIZE as u32) as usize;
        let mut cur = if self.dir[slot].first_data == FAT_EOC {
            match self.fat.alloc_head() {
                Some(head) => {
                    self.dir[slot].first_data = head;
                    head
                }
                None => {
                    log::warn!("write: volume full, could not allocate head block");
                    return Ok(0);
                }
            }
        } else {
            let head = self.dir[slot].first_data;
            let landed = self.fat.walk(head, offset / BLOCK_SIZE as u32);
            if landed == FAT_EOC {
                let prev_step = offset / BLOCK_SIZE as u32 - 1;
                let prev = self.fat.walk(head, prev_step);
                match self.fat.extend(prev) {
                    Some(next) => next,
                    None => {
                        log::warn!("write: volume full, could not extend chain");
                        return Ok(0);
                    }
                }
            } else {
                landed
            }
        };

        let mut remaining = buf.len();
        let mut copied = 0usize;
        loop {
            self.device
                .read_block(self.superblock.data_blk + cur, &mut self.bounce)
                .map_err(Error::IoError)?;
            let n = remaining.min(BLOCK_SIZE - in_block);
            self.bounce[in_block..in_block + n].copy_from_slice(&buf[copied..copied + n]);
            self.device
                .write_block(self.superblock.data_blk + cur, &self.bounce)
                .map_err(Error::IoError)?;
            copied += n;
            remaining -= n;
            in_block = 0;

            if remaining == 0 {
                break;
            }
            if self.fat.walk(cur, 1) == FAT_EOC {
                match self.fat.extend(cur) {
                    Some(next) => cur = next,
                    None => {
                        log::warn!("write: short write, volume full after {} bytes", copied);
                        break;
                    }
                }
            } else {
                cur = self.fat.walk(cur, 1);
            }
        }

        self.open_files.get_mut(fd).unwrap().offset += copied as u32;
        let new_offset = self.open_files.get(fd).unwrap().offset;
        if new_offset > self.dir[slot].file_size {
            self.dir[slot].file_size = new_offset;
        }
        log::trace!("write fd={} copied={}", fd, copied);
        Ok(copied)
    }
}

//! The File Allocation Table: a flat array of 16-bit links forming one
//! singly-linked chain per file.
//!
//! Everything outside this module reaches the FAT only through `walk`,
//! `alloc_head`, `extend`, `free_chain` and `free_count`, never raw
//! entries, so chain traversal and allocation stay in one place.

use crate::block::{BlockBuf, BLOCK_SIZE};
use crate::layout::{FAT_ENTRIES_PER_BLOCK, FAT_EOC};
use byteorder::{ByteOrder, LittleEndian};

/// The in-memory FAT image: every entry across all `fat_blk_count` blocks,
/// kept resident for the life of a mount.
pub struct Fat {
    entries: Vec<u16>,
    data_blk_count: u16,
}

impl Fat {
    /// Builds the FAT image from the `fat_blk_count` on-disk blocks that
    /// follow the superblock.
    pub fn parse(blocks: &[BlockBuf], data_blk_count: u16) -> Self {
        let mut entries = Vec::with_capacity(blocks.len() * FAT_ENTRIES_PER_BLOCK as usize);
        for block in blocks {
            for chunk in block.chunks_exact(2) {
                entries.push(LittleEndian::read_u16(chunk));
            }
        }
        entries[0] = FAT_EOC;
        Fat {
            entries,
            data_blk_count,
        }
    }

    /// Serializes the FAT back into `fat_blk_count` whole blocks, in order.
    pub fn serialize(&self) -> Vec<BlockBuf> {
        self.entries
            .chunks(FAT_ENTRIES_PER_BLOCK as usize)
            .map(|chunk| {
                let mut block = [0u8; BLOCK_SIZE];
                for (i, entry) in chunk.iter().enumerate() {
                    LittleEndian::write_u16(&mut block[i * 2..i * 2 + 2], *entry);
                }
                block
            })
            .collect()
    }

    /// Direct link lookup: what does entry `idx` point to?
    fn get(&self, idx: u16) -> u16 {
        self.entries[idx as usize]
    }

    fn set(&mut self, idx: u16, value: u16) {
        self.entries[idx as usize] = value;
    }

    /// Follows the chain from `head`, skipping `k` links. Returns `FAT_EOC`
    /// if the chain ends before `k` links are walked.
    pub fn walk(&self, head: u16, k: u32) -> u16 {
        let mut cur = head;
        for _ in 0..k {
            if cur == FAT_EOC {
                return FAT_EOC;
            }
            cur = self.get(cur);
        }
        cur
    }

    /// First-fit scan for a free (zero) entry, starting at index 1 (index 0
    /// is reserved). Returns `None` when the volume is full.
    fn first_free(&self) -> Option<u16> {
        (1..self.data_blk_count).find(|&i| self.get(i) == 0)
    }

    /// Allocates a new block and links it as the successor of `prev`.
    /// Returns the new block's FAT index.
    pub fn extend(&mut self, prev: u16) -> Option<u16> {
        let new_index = self.first_free()?;
        self.set(prev, new_index);
        self.set(new_index, FAT_EOC);
        Some(new_index)
    }

    /// Allocates the first block of a previously-empty file's chain.
    /// Identical to `extend` but has no predecessor entry to link from.
    /// The caller is responsible for recording the returned index as the
    /// directory slot's `first_data`.
    pub fn alloc_head(&mut self) -> Option<u16> {
        let new_index = self.first_free()?;
        self.set(new_index, FAT_EOC);
        Some(new_index)
    }

    /// Frees every block in the chain starting at `head`.
    pub fn free_chain(&mut self, head: u16) {
        let mut cur = head;
        while cur != FAT_EOC {
            let next = self.get(cur);
            self.set(cur, 0);
            cur = next;
        }
    }

    /// Number of free entries in `[1, data_blk_count)`, excluding the
    /// reserved entry 0.
    pub fn free_count(&self) -> u32 {
        (1..self.data_blk_count)
            .filter(|&i| self.get(i) == 0)
            .count() as u32
    }

    /// Length of the chain starting at `head` (0 for an empty/`FAT_EOC`
    /// head). Used by tests to check the length-matches-file-size
    /// invariant.
    #[cfg(test)]
    pub fn chain_len(&self, head: u16) -> u32 {
        let mut len = 0;
        let mut cur = head;
        while cur != FAT_EOC {
            len += 1;
            cur = self.get(cur);
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MAX_FAT_BLOCKS;

    fn fresh_fat(data_blk_count: u16) -> Fat {
        let blocks = vec![[0u8; BLOCK_SIZE]; MAX_FAT_BLOCKS as usize];
        Fat::parse(&blocks, data_blk_count)
    }

    #[test]
    fn entry_zero_is_always_eoc() {
        let fat = fresh_fat(100);
        assert_eq!(fat.get(0), FAT_EOC);
    }

    #[test]
    fn allocation_is_lowest_index_first() {
        let mut fat = fresh_fat(10);
        let a = fat.alloc_head().unwrap();
        assert_eq!(a, 1);
        let b = fat.extend(a).unwrap();
        assert_eq!(b, 2);
        assert_eq!(fat.get(a), b);
        assert_eq!(fat.get(b), FAT_EOC);
    }

    #[test]
    fn free_chain_zeroes_every_link() {
        let mut fat = fresh_fat(10);
        let a = fat.alloc_head().unwrap();
        let b = fat.extend(a).unwrap();
        let c = fat.extend(b).unwrap();
        fat.free_chain(a);
        assert_eq!(fat.get(a), 0);
        assert_eq!(fat.get(b), 0);
        assert_eq!(fat.get(c), 0);
        assert_eq!(fat.free_count(), 9);
    }

    #[test]
    fn exhausts_cleanly_at_capacity() {
        let mut fat = fresh_fat(3);
        let a = fat.alloc_head().unwrap();
        let b = fat.extend(a).unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(fat.extend(b).is_none());
        assert_eq!(fat.free_count(), 0);
    }

    #[test]
    fn walk_stops_at_eoc() {
        let mut fat = fresh_fat(10);
        let a = fat.alloc_head().unwrap();
        let b = fat.extend(a).unwrap();
        assert_eq!(fat.walk(a, 0), a);
        assert_eq!(fat.walk(a, 1), b);
        assert_eq!(fat.walk(a, 2), FAT_EOC);
        assert_eq!(fat.chain_len(a), 2);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut fat = fresh_fat(10);
        let a = fat.alloc_head().unwrap();
        fat.extend(a).unwrap();
        let blocks = fat.serialize();
        let parsed = Fat::parse(&blocks, 10);
        assert_eq!(parsed.entries, fat.entries);
    }
}

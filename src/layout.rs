//! On-disk layout: the superblock and root-directory slot formats, plus the
//! field-accessor macro used to read them.
//!
//! All integers are little-endian and structures are packed without
//! padding, exactly as they sit on disk.

use crate::block::{BlockBuf, BLOCK_SIZE};
use byteorder::{ByteOrder, LittleEndian};

/// Maximum number of files the root directory can hold.
pub const FS_FILE_MAX_COUNT: usize = 128;
/// Maximum number of simultaneously open handles.
pub const FS_OPEN_MAX_COUNT: usize = 32;
/// Maximum file name length, including the terminating NUL.
pub const FS_FILENAME_LEN: usize = 16;
/// End-of-chain sentinel for FAT entries.
pub const FAT_EOC: u16 = 0xFFFF;
/// The 8-byte ASCII signature a mounted volume's block 0 must carry.
pub const SIGNATURE: &[u8; 8] = b"ECS150FS";
/// Number of 16-bit FAT entries that fit in one block.
pub const FAT_ENTRIES_PER_BLOCK: u32 = (BLOCK_SIZE / 2) as u32;
/// Largest number of blocks the FAT may span.
pub const MAX_FAT_BLOCKS: u8 = 4;

const DIR_ENTRY_LEN: usize = 32;

/// Reads a little-endian field at a fixed byte offset out of a block-sized
/// buffer. Mirrors the field-accessor pattern used to parse on-disk BPBs
/// and directory entries, generalized to the three integer widths this
/// format actually uses.
macro_rules! define_field {
    ($name:ident, u8, $offset:expr) => {
        pub fn $name(&self) -> u8 {
            self.data[$offset]
        }
    };
    ($name:ident, u16, $offset:expr) => {
        pub fn $name(&self) -> u16 {
            LittleEndian::read_u16(&self.data[$offset..$offset + 2])
        }
    };
    ($name:ident, u32, $offset:expr) => {
        pub fn $name(&self) -> u32 {
            LittleEndian::read_u32(&self.data[$offset..$offset + 4])
        }
    };
}

/// A read-only view over the raw bytes of block 0.
pub struct RawSuperblock<'a> {
    data: &'a BlockBuf,
}

impl<'a> RawSuperblock<'a> {
    pub fn new(data: &'a BlockBuf) -> Self {
        Self { data }
    }

    pub fn signature(&self) -> &[u8; 8] {
        // Safe: BLOCK_SIZE is always >= 8.
        self.data[0..8].try_into().unwrap()
    }

    define_field!(total_blk_count, u16, 8);
    define_field!(rdir_blk, u16, 10);
    define_field!(data_blk, u16, 12);
    define_field!(data_blk_count, u16, 14);
    define_field!(fat_blk_count, u8, 16);
}

/// In-memory copy of the superblock, kept resident for the life of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub total_blk_count: u16,
    pub rdir_blk: u16,
    pub data_blk: u16,
    pub data_blk_count: u16,
    pub fat_blk_count: u8,
}

impl Superblock {
    /// Parses and validates a superblock out of block 0's raw bytes.
    ///
    /// Checks the signature and the internal layout invariants from the
    /// on-disk format (§3); the caller is responsible for comparing
    /// `total_blk_count` against the block device's own block count.
    pub fn parse(block: &BlockBuf) -> Option<Self> {
        let raw = RawSuperblock::new(block);
        if raw.signature() != SIGNATURE {
            return None;
        }
        let sb = Superblock {
            total_blk_count: raw.total_blk_count(),
            rdir_blk: raw.rdir_blk(),
            data_blk: raw.data_blk(),
            data_blk_count: raw.data_blk_count(),
            fat_blk_count: raw.fat_blk_count(),
        };
        if !sb.layout_is_valid() {
            return None;
        }
        Some(sb)
    }

    fn layout_is_valid(&self) -> bool {
        if self.fat_blk_count == 0 || self.fat_blk_count > MAX_FAT_BLOCKS {
            return false;
        }
        if self.rdir_blk != 1 + self.fat_blk_count as u16 {
            return false;
        }
        if self.data_blk != self.rdir_blk + 1 {
            return false;
        }
        if self.data_blk as u32 + self.data_blk_count as u32 != self.total_blk_count as u32 {
            return false;
        }
        let max_entries = self.fat_blk_count as u32 * FAT_ENTRIES_PER_BLOCK;
        let min_entries = (self.fat_blk_count as u32 - 1) * FAT_ENTRIES_PER_BLOCK;
        let data_blk_count = self.data_blk_count as u32;
        data_blk_count <= max_entries && data_blk_count > min_entries
    }

    /// Serializes this superblock back into a zeroed block-sized buffer.
    pub fn serialize(&self) -> BlockBuf {
        let mut block = [0u8; BLOCK_SIZE];
        block[0..8].copy_from_slice(SIGNATURE);
        LittleEndian::write_u16(&mut block[8..10], self.total_blk_count);
        LittleEndian::write_u16(&mut block[10..12], self.rdir_blk);
        LittleEndian::write_u16(&mut block[12..14], self.data_blk);
        LittleEndian::write_u16(&mut block[14..16], self.data_blk_count);
        block[16] = self.fat_blk_count;
        block
    }
}

/// One 32-byte root-directory slot, owned in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirSlot {
    pub name: [u8; FS_FILENAME_LEN],
    pub file_size: u32,
    pub first_data: u16,
}

impl DirSlot {
    /// An unused slot: first name byte zero, size zero, no chain.
    pub const EMPTY: DirSlot = DirSlot {
        name: [0u8; FS_FILENAME_LEN],
        file_size: 0,
        first_data: FAT_EOC,
    };

    pub fn is_empty(&self) -> bool {
        self.name[0] == 0x00
    }

    /// The name as a byte string, trimmed at the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..len]
    }

    fn parse(bytes: &[u8]) -> Self {
        let mut name = [0u8; FS_FILENAME_LEN];
        name.copy_from_slice(&bytes[0..FS_FILENAME_LEN]);
        let file_size = LittleEndian::read_u32(&bytes[16..20]);
        let first_data = LittleEndian::read_u16(&bytes[20..22]);
        DirSlot {
            name,
            file_size,
            first_data,
        }
    }

    fn serialize_into(&self, bytes: &mut [u8]) {
        bytes[0..FS_FILENAME_LEN].copy_from_slice(&self.name);
        LittleEndian::write_u32(&mut bytes[16..20], self.file_size);
        LittleEndian::write_u16(&mut bytes[20..22], self.first_data);
        bytes[22..32].fill(0);
    }
}

/// Parses all 128 root-directory slots out of the root-directory block.
pub fn parse_root_dir(block: &BlockBuf) -> [DirSlot; FS_FILE_MAX_COUNT] {
    let mut slots = [DirSlot::EMPTY; FS_FILE_MAX_COUNT];
    for (i, slot) in slots.iter_mut().enumerate() {
        let start = i * DIR_ENTRY_LEN;
        *slot = DirSlot::parse(&block[start..start + DIR_ENTRY_LEN]);
    }
    slots
}

/// Serializes all 128 root-directory slots back into one block.
pub fn serialize_root_dir(slots: &[DirSlot; FS_FILE_MAX_COUNT]) -> BlockBuf {
    let mut block = [0u8; BLOCK_SIZE];
    for (i, slot) in slots.iter().enumerate() {
        let start = i * DIR_ENTRY_LEN;
        slot.serialize_into(&mut block[start..start + DIR_ENTRY_LEN]);
    }
    block
}

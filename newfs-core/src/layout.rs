//! Fixed region layout and on-disk superblock structure.

use crate::error::{Error, Result};
use std::mem::size_of;
use std::slice;

/// Magic number stamped at byte 0 of a formatted device.
pub const MAGIC: u32 = 0x2011_0505;

/// Blocks reserved for the superblock.
pub const SUPER_BLKS: u32 = 1;
/// Blocks reserved for the inode bitmap.
pub const INODE_MAP_BLKS: u32 = 1;
/// Blocks reserved for the data-block bitmap.
pub const DATA_MAP_BLKS: u32 = 1;
/// Blocks reserved for the inode table.
pub const INODE_BLKS: u32 = 37;
/// Inodes stored per inode-table block.
pub const MAX_INODE_PER_BLK: u32 = 16;
/// Blocks reserved for the data region.
pub const DATA_BLKS: u32 = 4056;
/// Number of block pointers carried by every inode.
pub const DATA_PER_FILE: usize = 6;
/// Maximum length of a filename, in bytes.
pub const MAX_NAME_LEN: usize = 128;
/// The root directory's inode number, fixed by construction.
pub const ROOT_INO: u32 = 0;
/// Total blocks spanned by every region, fixed at compile time: the
/// filesystem never grows or shrinks past this (§2 non-goal: no resizing).
pub const TOTAL_BLKS: u32 = SUPER_BLKS + INODE_MAP_BLKS + DATA_MAP_BLKS + INODE_BLKS + DATA_BLKS;

/// The exact backing-store size, in bytes, for a device whose native I/O
/// unit is `io_unit` (the logical block size is `2 * io_unit`, per
/// [`crate::io::BlockIo`]). A device formatted by [`SuperBlock::format`]
/// must be at least this large.
pub fn device_capacity(io_unit: u64) -> u64 {
    TOTAL_BLKS as u64 * io_unit * 2
}

/// One region's position on disk, in blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub offset: u32,
    pub blocks: u32,
}

/// The full region layout of a mounted filesystem, plus the limits derived
/// from it. This is the in-memory counterpart of the on-disk superblock;
/// `usage` and `magic` round out the bytes actually persisted.
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub magic: u32,
    pub usage: u32,
    pub super_blk: Region,
    pub inode_bitmap: Region,
    pub data_bitmap: Region,
    pub inode_table: Region,
    pub data_region: Region,
    pub max_ino: u32,
    pub max_data: u32,
    pub root_ino: u32,
}

impl SuperBlock {
    /// Lays out a fresh superblock: superblock at block 0, then each region
    /// stacked in turn, per §4.2.
    pub fn format() -> Self {
        let super_blk = Region {
            offset: 0,
            blocks: SUPER_BLKS,
        };
        let inode_bitmap = Region {
            offset: super_blk.offset + super_blk.blocks,
            blocks: INODE_MAP_BLKS,
        };
        let data_bitmap = Region {
            offset: inode_bitmap.offset + inode_bitmap.blocks,
            blocks: DATA_MAP_BLKS,
        };
        let inode_table = Region {
            offset: data_bitmap.offset + data_bitmap.blocks,
            blocks: INODE_BLKS,
        };
        let data_region = Region {
            offset: inode_table.offset + inode_table.blocks,
            blocks: DATA_BLKS,
        };
        Self {
            magic: MAGIC,
            usage: 0,
            super_blk,
            inode_bitmap,
            data_bitmap,
            inode_table,
            data_region,
            max_ino: MAX_INODE_PER_BLK * INODE_BLKS,
            max_data: DATA_BLKS,
            root_ino: ROOT_INO,
        }
    }

    /// Byte offset of the `i`-th on-disk inode slot.
    pub fn ino_offset(&self, block_size: u64, ino: u32, inode_disk_size: u64) -> u64 {
        self.inode_table.offset as u64 * block_size + ino as u64 * inode_disk_size
    }

    /// Byte offset of the `dno`-th data block.
    pub fn data_offset(&self, block_size: u64, dno: u32) -> u64 {
        self.data_region.offset as u64 * block_size + dno as u64 * block_size
    }

    /// Serializes to the fixed on-disk layout (§6.3): 15 `u32`s, packed with
    /// no padding, written out through a raw byte view of [`RawSuperBlock`]
    /// the same way the disk structures elsewhere in this crate are.
    pub fn to_bytes(&self) -> Vec<u8> {
        let raw = RawSuperBlock {
            magic: self.magic,
            usage: self.usage,
            super_blk_offset: self.super_blk.offset,
            super_blk_blocks: self.super_blk.blocks,
            inode_bitmap_offset: self.inode_bitmap.offset,
            inode_bitmap_blocks: self.inode_bitmap.blocks,
            data_bitmap_offset: self.data_bitmap.offset,
            data_bitmap_blocks: self.data_bitmap.blocks,
            inode_table_offset: self.inode_table.offset,
            inode_table_blocks: self.inode_table.blocks,
            data_region_offset: self.data_region.offset,
            data_region_blocks: self.data_region.blocks,
            max_ino: self.max_ino,
            max_data: self.max_data,
            root_ino: self.root_ino,
        };
        let slice = unsafe {
            slice::from_raw_parts(&raw as *const _ as *const u8, size_of::<RawSuperBlock>())
        };
        slice.to_vec()
    }

    /// The byte size of the serialized form, i.e. `Self::to_bytes().len()`.
    pub const DISK_SIZE: usize = size_of::<RawSuperBlock>();

    /// Parses a superblock from its on-disk representation. Returns
    /// `Err(Error::Inval)` if `bytes` is too short.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::DISK_SIZE {
            return Err(Error::Inval("superblock image too short".into()));
        }
        let mut raw: RawSuperBlock = unsafe { std::mem::zeroed() };
        let slice = unsafe {
            slice::from_raw_parts_mut(&mut raw as *mut _ as *mut u8, size_of::<RawSuperBlock>())
        };
        slice.copy_from_slice(&bytes[..Self::DISK_SIZE]);
        Ok(Self {
            magic: raw.magic,
            usage: raw.usage,
            super_blk: Region {
                offset: raw.super_blk_offset,
                blocks: raw.super_blk_blocks,
            },
            inode_bitmap: Region {
                offset: raw.inode_bitmap_offset,
                blocks: raw.inode_bitmap_blocks,
            },
            data_bitmap: Region {
                offset: raw.data_bitmap_offset,
                blocks: raw.data_bitmap_blocks,
            },
            inode_table: Region {
                offset: raw.inode_table_offset,
                blocks: raw.inode_table_blocks,
            },
            data_region: Region {
                offset: raw.data_region_offset,
                blocks: raw.data_region_blocks,
            },
            max_ino: raw.max_ino,
            max_data: raw.max_data,
            root_ino: raw.root_ino,
        })
    }
}

/// The superblock's on-disk layout: 15 `u32`s, flattened out of the
/// [`Region`]s [`SuperBlock`] groups them into for ergonomics.
#[repr(C, packed)]
struct RawSuperBlock {
    magic: u32,
    usage: u32,
    super_blk_offset: u32,
    super_blk_blocks: u32,
    inode_bitmap_offset: u32,
    inode_bitmap_blocks: u32,
    data_bitmap_offset: u32,
    data_bitmap_blocks: u32,
    inode_table_offset: u32,
    inode_table_blocks: u32,
    data_region_offset: u32,
    data_region_blocks: u32,
    max_ino: u32,
    max_data: u32,
    root_ino: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_lays_out_regions_in_order() {
        let sb = SuperBlock::format();
        assert_eq!(sb.super_blk.offset, 0);
        assert_eq!(sb.inode_bitmap.offset, 1);
        assert_eq!(sb.data_bitmap.offset, 2);
        assert_eq!(sb.inode_table.offset, 3);
        assert_eq!(sb.data_region.offset, 3 + INODE_BLKS);
        assert_eq!(sb.max_ino, 592);
        assert_eq!(sb.max_data, 4056);
        assert_eq!(sb.root_ino, 0);
    }

    #[test]
    fn round_trips_through_bytes() {
        let sb = SuperBlock::format();
        let bytes = sb.to_bytes();
        let back = SuperBlock::from_bytes(&bytes).unwrap();
        assert_eq!(back.magic, MAGIC);
        assert_eq!(back.data_region.offset, sb.data_region.offset);
        assert_eq!(back.max_ino, sb.max_ino);
    }
}

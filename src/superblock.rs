/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! The superblock describes the layout of every region of a disk image.
//!
//! It is stored at offset zero of every disk and is byte-identical on all of
//! them, except for the `disk_index` field.

use crate::BLOCK_SIZE;
use crate::error::Error;
use crate::raid::RaidMode;
use byteorder::{ByteOrder, LittleEndian};
use std::ops::Range;

/// The filesystem's signature.
pub const MAGIC: u64 = u64::from_le_bytes(*b"RAIDFS\0\0");

/// The on-disk filesystem header.
///
/// Region offsets are byte offsets from the beginning of the disk image. All
/// fields are encoded little-endian.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Superblock {
    /// The total number of inode slots, a multiple of 32.
    pub num_inodes: u64,
    /// The total number of data blocks, a multiple of 32.
    pub num_data_blocks: u64,
    /// The offset of the inode bitmap.
    pub i_bitmap_ptr: i64,
    /// The offset of the data-block bitmap.
    pub d_bitmap_ptr: i64,
    /// The offset of the inode region.
    pub i_blocks_ptr: i64,
    /// The offset of the data-block region.
    pub d_blocks_ptr: i64,
    /// The number of participating disks.
    pub num_disks: u32,
    /// This disk's ordinal, in `0..num_disks`.
    pub disk_index: u32,
    /// The RAID mode.
    pub mode: RaidMode,
}

impl Superblock {
    /// The encoded size of the superblock in bytes.
    pub const SIZE: usize = 68;

    /// Computes the region layout of a fresh image.
    ///
    /// The counts are used as given; the formatter rounds them beforehand.
    /// The returned superblock has `disk_index` zero.
    pub fn compute(
        num_inodes: u64,
        num_data_blocks: u64,
        num_disks: u32,
        mode: RaidMode,
    ) -> Self {
        let i_bitmap_ptr = Self::SIZE as i64;
        let d_bitmap_ptr = i_bitmap_ptr + num_inodes.div_ceil(8) as i64;
        let bitmaps_end = d_bitmap_ptr + num_data_blocks.div_ceil(8) as i64;
        let i_blocks_ptr = (bitmaps_end as u64).next_multiple_of(BLOCK_SIZE as u64) as i64;
        let d_blocks_ptr = i_blocks_ptr + (num_inodes * BLOCK_SIZE as u64) as i64;
        Self {
            num_inodes,
            num_data_blocks,
            i_bitmap_ptr,
            d_bitmap_ptr,
            i_blocks_ptr,
            d_blocks_ptr,
            num_disks,
            disk_index: 0,
            mode,
        }
    }

    /// Returns the total image size in bytes.
    pub fn image_size(&self) -> usize {
        self.d_blocks_ptr as usize + self.num_data_blocks as usize * BLOCK_SIZE
    }

    /// Returns the byte offset of inode slot `idx`.
    pub fn inode_off(&self, idx: u64) -> usize {
        self.i_blocks_ptr as usize + idx as usize * BLOCK_SIZE
    }

    /// Returns the byte offset of the data block at local index `local`.
    pub fn block_off(&self, local: u64) -> usize {
        self.d_blocks_ptr as usize + local as usize * BLOCK_SIZE
    }

    /// Returns the byte range of the inode bitmap.
    pub fn i_bitmap_range(&self) -> Range<usize> {
        let start = self.i_bitmap_ptr as usize;
        start..start + self.num_inodes.div_ceil(8) as usize
    }

    /// Returns the byte range of the data-block bitmap.
    pub fn d_bitmap_range(&self) -> Range<usize> {
        let start = self.d_bitmap_ptr as usize;
        start..start + self.num_data_blocks.div_ceil(8) as usize
    }

    /// Decodes the superblock from the head of a disk image.
    ///
    /// Fails with [`Error::InvalidArgument`] if the buffer is too short, the
    /// signature does not match or the RAID mode is unknown.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::SIZE {
            return Err(Error::InvalidArgument);
        }
        if LittleEndian::read_u64(&buf[0..8]) != MAGIC {
            return Err(Error::InvalidArgument);
        }
        let mode = RaidMode::from_raw(LittleEndian::read_u32(&buf[64..68]))?;
        Ok(Self {
            num_inodes: LittleEndian::read_u64(&buf[8..16]),
            num_data_blocks: LittleEndian::read_u64(&buf[16..24]),
            i_bitmap_ptr: LittleEndian::read_i64(&buf[24..32]),
            d_bitmap_ptr: LittleEndian::read_i64(&buf[32..40]),
            i_blocks_ptr: LittleEndian::read_i64(&buf[40..48]),
            d_blocks_ptr: LittleEndian::read_i64(&buf[48..56]),
            num_disks: LittleEndian::read_u32(&buf[56..60]),
            disk_index: LittleEndian::read_u32(&buf[60..64]),
            mode,
        })
    }

    /// Encodes the superblock at the head of a disk image.
    pub fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u64(&mut buf[0..8], MAGIC);
        LittleEndian::write_u64(&mut buf[8..16], self.num_inodes);
        LittleEndian::write_u64(&mut buf[16..24], self.num_data_blocks);
        LittleEndian::write_i64(&mut buf[24..32], self.i_bitmap_ptr);
        LittleEndian::write_i64(&mut buf[32..40], self.d_bitmap_ptr);
        LittleEndian::write_i64(&mut buf[40..48], self.i_blocks_ptr);
        LittleEndian::write_i64(&mut buf[48..56], self.d_blocks_ptr);
        LittleEndian::write_u32(&mut buf[56..60], self.num_disks);
        LittleEndian::write_u32(&mut buf[60..64], self.disk_index);
        LittleEndian::write_u32(&mut buf[64..68], self.mode.to_raw());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn layout_offsets() {
        let sb = Superblock::compute(32, 64, 2, RaidMode::Mirror);
        assert_eq!(sb.i_bitmap_ptr, 68);
        // 32 inodes take 4 bitmap bytes
        assert_eq!(sb.d_bitmap_ptr, 72);
        // the inode region starts at the next block boundary after the bitmaps
        assert_eq!(sb.i_blocks_ptr, 512);
        assert_eq!(sb.d_blocks_ptr, 512 + 32 * BLOCK_SIZE as i64);
        assert_eq!(sb.image_size(), 512 + (32 + 64) * BLOCK_SIZE);
    }

    #[test]
    pub fn bitmap_ranges() {
        let sb = Superblock::compute(64, 32, 2, RaidMode::Stripe);
        assert_eq!(sb.i_bitmap_range(), 68..76);
        assert_eq!(sb.d_bitmap_range(), 76..80);
    }

    #[test]
    pub fn codec_round_trip() {
        let mut sb = Superblock::compute(96, 128, 3, RaidMode::VerifiedMirror);
        sb.disk_index = 2;
        let mut buf = [0u8; Superblock::SIZE];
        sb.encode(&mut buf);
        assert_eq!(Superblock::decode(&buf).unwrap(), sb);
    }

    #[test]
    pub fn rejects_bad_magic() {
        let buf = [0u8; Superblock::SIZE];
        Superblock::decode(&buf).unwrap_err();
        Superblock::decode(&buf[..12]).unwrap_err();
    }
}

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

//! The offline formatter: writes an empty, consistent filesystem image to
//! every backing disk.

use crate::BLOCK_SIZE;
use crate::bitmap;
use crate::disk::DiskMap;
use crate::error::Error;
use crate::inode::Inode;
use crate::raid::RaidMode;
use crate::superblock::Superblock;
use std::fs;
use std::path::Path;

/// Parameters of a fresh filesystem image.
#[derive(Clone, Copy, Debug)]
pub struct FormatOptions {
    /// The RAID mode.
    pub mode: RaidMode,
    /// The requested number of inode slots.
    pub num_inodes: u64,
    /// The requested number of data blocks.
    pub num_data_blocks: u64,
}

/// Rounds a slot count up to the bitmap granularity.
fn round_up_32(n: u64) -> u64 {
    n.div_ceil(32) * 32
}

/// Formats every disk in `paths` with an identical empty filesystem.
///
/// The order of `paths` defines each disk's index. The requested counts are
/// rounded up to multiples of 32. Fails with [`Error::InvalidArgument`] when
/// fewer than two disks are given or a count is zero, and with
/// [`Error::DiskTooSmall`] when a backing file cannot hold the image.
pub fn format<P: AsRef<Path>>(paths: &[P], opts: &FormatOptions) -> Result<(), Error> {
    if paths.len() < 2 || opts.num_inodes == 0 || opts.num_data_blocks == 0 {
        return Err(Error::InvalidArgument);
    }
    let num_inodes = round_up_32(opts.num_inodes);
    let num_data_blocks = round_up_32(opts.num_data_blocks);
    let mut sb = Superblock::compute(num_inodes, num_data_blocks, paths.len() as u32, opts.mode);
    let image_size = sb.image_size();
    let root = Inode::new_directory(0, 0o777);
    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        if (fs::metadata(path)?.len() as usize) < image_size {
            return Err(Error::DiskTooSmall);
        }
        let mut map = DiskMap::open_len(path, image_size)?;
        sb.disk_index = i as u32;
        let bytes = map.bytes_mut();
        bytes.fill(0);
        sb.encode(&mut bytes[..Superblock::SIZE]);
        bitmap::set(&mut bytes[sb.i_bitmap_range()], 0);
        let off = sb.inode_off(0);
        root.encode(&mut bytes[off..off + BLOCK_SIZE]);
        map.sync()?;
    }
    Ok(())
}

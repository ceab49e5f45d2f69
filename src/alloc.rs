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

//! Bitmap-backed inode and data-block allocators.
//!
//! Both bitmaps are mirrored on every disk in every RAID mode: a slot is free
//! iff every disk reports it free, and allocating commits the bit to every
//! disk. Allocation is linear first-fit; there is no free list.

use crate::bitmap;
use crate::disk::DiskMap;
use crate::error::Error;
use crate::raid::RaidMode;
use crate::superblock::Superblock;

/// Allocates the lowest free inode slot, committing the bitmap bit to every
/// disk.
pub fn alloc_inode(sb: &Superblock, disks: &mut [DiskMap]) -> Result<u64, Error> {
    for i in 0..sb.num_inodes {
        let free = disks
            .iter()
            .all(|d| !bitmap::get(&d.bytes()[sb.i_bitmap_range()], i));
        if free {
            for d in disks.iter_mut() {
                let range = sb.i_bitmap_range();
                bitmap::set(&mut d.bytes_mut()[range], i);
            }
            return Ok(i);
        }
    }
    Err(Error::NoSpace)
}

/// Clears inode slot `idx`'s bitmap bit on every disk.
pub fn free_inode(sb: &Superblock, disks: &mut [DiskMap], idx: u64) {
    for d in disks.iter_mut() {
        let range = sb.i_bitmap_range();
        bitmap::clear(&mut d.bytes_mut()[range], idx);
    }
}

/// Allocates the lowest free data block, committing the bitmap bit to every
/// disk.
pub fn alloc_block(sb: &Superblock, disks: &mut [DiskMap]) -> Result<i64, Error> {
    for b in 0..sb.num_data_blocks {
        let free = disks
            .iter()
            .all(|d| !bitmap::get(&d.bytes()[sb.d_bitmap_range()], b));
        if free {
            for d in disks.iter_mut() {
                let range = sb.d_bitmap_range();
                bitmap::set(&mut d.bytes_mut()[range], b);
            }
            return Ok(b as i64);
        }
    }
    Err(Error::NoSpace)
}

/// Clears data block `b`'s bitmap bit on every disk.
pub fn free_block(sb: &Superblock, disks: &mut [DiskMap], b: u64) {
    for d in disks.iter_mut() {
        let range = sb.d_bitmap_range();
        bitmap::clear(&mut d.bytes_mut()[range], b);
    }
}

/// Allocates a data block to hold a directory page.
///
/// Under striping, the mirrored page occupies the stripe slot of its row on
/// every disk, so the whole row of block indices is claimed to keep striped
/// file data out of that slot. In the mirror modes this is a plain block
/// allocation.
pub fn alloc_dir_page(sb: &Superblock, disks: &mut [DiskMap]) -> Result<i64, Error> {
    match sb.mode {
        RaidMode::Stripe => {
            let n = sb.num_disks as u64;
            let mut b = 0;
            while b + n <= sb.num_data_blocks {
                let row_free = (b..b + n).all(|i| {
                    disks
                        .iter()
                        .all(|d| !bitmap::get(&d.bytes()[sb.d_bitmap_range()], i))
                });
                if row_free {
                    for i in b..b + n {
                        for d in disks.iter_mut() {
                            let range = sb.d_bitmap_range();
                            bitmap::set(&mut d.bytes_mut()[range], i);
                        }
                    }
                    return Ok(b as i64);
                }
                b += n;
            }
            Err(Error::NoSpace)
        }
        RaidMode::Mirror | RaidMode::VerifiedMirror => alloc_block(sb, disks),
    }
}

/// Releases a directory page allocated with [`alloc_dir_page`].
pub fn free_dir_page(sb: &Superblock, disks: &mut [DiskMap], b: u64) {
    match sb.mode {
        RaidMode::Stripe => {
            for i in b..b + sb.num_disks as u64 {
                free_block(sb, disks, i);
            }
        }
        RaidMode::Mirror | RaidMode::VerifiedMirror => free_block(sb, disks, b),
    }
}

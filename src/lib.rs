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

//! `raidfs` is a small POSIX-style user-space filesystem layered over a set of
//! fixed-size backing files ("disks") that are memory-mapped into the process.
//!
//! Data is replicated or striped across the disks according to the RAID mode
//! recorded in the superblock:
//! - mode `0`: data blocks are distributed round-robin across disks;
//! - mode `1`: every data block is copied to every disk;
//! - mode `2`: as mode `1` ("verified" mirroring).
//!
//! The inode region, both allocation bitmaps and all directory pages are
//! mirrored on every disk regardless of the mode.
//!
//! A filesystem is created with the `mkfs-raidfs` tool and driven through the
//! [`fs::Fs`] context, which owns the disk mappings and exposes one method per
//! filesystem operation.

pub mod alloc;
pub mod bitmap;
pub mod directory_entry;
pub mod disk;
pub mod error;
pub mod format;
pub mod fs;
pub mod inode;
pub mod path;
pub mod raid;
pub mod superblock;

/// The unit of allocation and I/O, in bytes.
pub const BLOCK_SIZE: usize = 512;
/// The number of block pointers held by an inode, indirect pointer included.
pub const N_BLOCKS: usize = 16;
/// The number of direct block pointers in an inode (`blocks[..D_BLOCK]`).
pub const D_BLOCK: usize = N_BLOCKS - 1;
/// The index of the indirect block pointer in an inode's pointer array.
pub const IND_BLOCK: usize = N_BLOCKS - 1;
/// The maximum number of bytes stored for a directory entry name, including
/// the terminating NUL.
pub const MAX_NAME: usize = 28;
/// The number of block indices held by an indirect page.
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<i64>();

pub use error::Error;
pub use fs::{Fs, Stat};
pub use raid::RaidMode;

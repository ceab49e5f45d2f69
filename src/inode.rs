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

//! An inode represents a file in the filesystem.
//!
//! Each inode occupies one block-sized slot of the inode region. The inode
//! region is mirrored byte-for-byte on every disk regardless of the RAID
//! mode, so reads always use disk 0 and writes touch every disk.

use crate::disk::DiskMap;
use crate::superblock::Superblock;
use crate::{BLOCK_SIZE, N_BLOCKS, PTRS_PER_BLOCK};
use byteorder::{ByteOrder, LittleEndian};
use std::time::{SystemTime, UNIX_EPOCH};

/// File type bit for directories.
pub const MODE_DIRECTORY: u32 = libc::S_IFDIR as u32;
/// File type bit for regular files.
pub const MODE_REGULAR: u32 = libc::S_IFREG as u32;
/// Mask of the file type bits within an inode's `mode`.
pub const MODE_TYPE_MASK: u32 = libc::S_IFMT as u32;

/// The decoded form of one on-disk inode slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Inode {
    /// The index of the inode in the inode table.
    pub num: u32,
    /// File type and permission bits.
    pub mode: u32,
    /// The owning user at creation.
    pub uid: u32,
    /// The owning group at creation.
    pub gid: u32,
    /// Last access time, in whole seconds since the Unix epoch.
    pub atim: i64,
    /// Last content modification time.
    pub mtim: i64,
    /// Last metadata change time.
    pub ctim: i64,
    /// Logical size in bytes. For directories, the number of occupied entry
    /// slots times the entry size.
    pub size: i64,
    /// The number of links to the inode.
    pub nlinks: u32,
    /// Block pointers. `-1` marks an unallocated slot; the last entry points
    /// at the indirect page.
    pub blocks: [i64; N_BLOCKS],
}

impl Inode {
    fn new(num: u32, mode: u32, nlinks: u32) -> Self {
        let now = unix_timestamp();
        Self {
            num,
            mode,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            atim: now,
            mtim: now,
            ctim: now,
            size: 0,
            nlinks,
            blocks: [-1; N_BLOCKS],
        }
    }

    /// Returns a fresh regular file inode with the given permission bits.
    pub fn new_file(num: u32, mode: u32) -> Self {
        Self::new(num, mode | MODE_REGULAR, 1)
    }

    /// Returns a fresh directory inode with the given permission bits, masked
    /// to `0777`.
    pub fn new_directory(num: u32, mode: u32) -> Self {
        Self::new(num, (mode & 0o777) | MODE_DIRECTORY, 2)
    }

    /// Tells whether the inode is a directory.
    pub fn is_directory(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_DIRECTORY
    }

    /// Decodes an inode from the beginning of its block slot.
    pub fn decode(buf: &[u8]) -> Self {
        let mut blocks = [-1i64; N_BLOCKS];
        for (i, b) in blocks.iter_mut().enumerate() {
            *b = LittleEndian::read_i64(&buf[52 + i * 8..60 + i * 8]);
        }
        Self {
            num: LittleEndian::read_u32(&buf[0..4]),
            mode: LittleEndian::read_u32(&buf[4..8]),
            uid: LittleEndian::read_u32(&buf[8..12]),
            gid: LittleEndian::read_u32(&buf[12..16]),
            atim: LittleEndian::read_i64(&buf[16..24]),
            mtim: LittleEndian::read_i64(&buf[24..32]),
            ctim: LittleEndian::read_i64(&buf[32..40]),
            size: LittleEndian::read_i64(&buf[40..48]),
            nlinks: LittleEndian::read_u32(&buf[48..52]),
            blocks,
        }
    }

    /// Encodes the inode at the beginning of its block slot.
    pub fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u32(&mut buf[0..4], self.num);
        LittleEndian::write_u32(&mut buf[4..8], self.mode);
        LittleEndian::write_u32(&mut buf[8..12], self.uid);
        LittleEndian::write_u32(&mut buf[12..16], self.gid);
        LittleEndian::write_i64(&mut buf[16..24], self.atim);
        LittleEndian::write_i64(&mut buf[24..32], self.mtim);
        LittleEndian::write_i64(&mut buf[32..40], self.ctim);
        LittleEndian::write_i64(&mut buf[40..48], self.size);
        LittleEndian::write_u32(&mut buf[48..52], self.nlinks);
        for (i, b) in self.blocks.iter().enumerate() {
            LittleEndian::write_i64(&mut buf[52 + i * 8..60 + i * 8], *b);
        }
    }
}

/// An indirect page: a data block holding block indices.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndirectBlock {
    /// Block indices, `-1` for unallocated entries.
    pub entries: [i64; PTRS_PER_BLOCK],
}

impl IndirectBlock {
    /// Returns an indirect page with every entry unallocated.
    pub fn new() -> Self {
        Self {
            entries: [-1; PTRS_PER_BLOCK],
        }
    }

    /// Decodes an indirect page from a data block.
    pub fn decode(buf: &[u8]) -> Self {
        let mut entries = [-1i64; PTRS_PER_BLOCK];
        for (i, e) in entries.iter_mut().enumerate() {
            *e = LittleEndian::read_i64(&buf[i * 8..(i + 1) * 8]);
        }
        Self { entries }
    }

    /// Encodes the indirect page into a data block.
    pub fn encode(&self, buf: &mut [u8]) {
        for (i, e) in self.entries.iter().enumerate() {
            LittleEndian::write_i64(&mut buf[i * 8..(i + 1) * 8], *e);
        }
    }
}

impl Default for IndirectBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes inode `idx` from disk 0's replica of the inode region.
pub fn read_inode(sb: &Superblock, disks: &[DiskMap], idx: u64) -> Inode {
    let off = sb.inode_off(idx);
    Inode::decode(&disks[0].bytes()[off..off + BLOCK_SIZE])
}

/// Encodes the inode into its slot on every disk.
pub fn write_inode(sb: &Superblock, disks: &mut [DiskMap], inode: &Inode) {
    let off = sb.inode_off(inode.num as u64);
    for disk in disks.iter_mut() {
        inode.encode(&mut disk.bytes_mut()[off..off + BLOCK_SIZE]);
    }
}

/// Returns the current Unix timestamp, in whole seconds.
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System clock panic!")
        .as_secs() as i64
}

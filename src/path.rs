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

//! Absolute path splitting and resolution.

use crate::directory_entry::DirectoryEntry;
use crate::disk::DiskMap;
use crate::error::Error;
use crate::inode::{Inode, read_inode};
use crate::superblock::Superblock;
use crate::{BLOCK_SIZE, D_BLOCK};

/// The inode index of the root directory.
pub const ROOT_INODE: u64 = 0;

/// Splits an absolute path into its parent path and final component.
///
/// `/a/b` yields (`/a`, `b`) and `/a` yields (`/`, `a`). The root itself
/// yields an empty final component and is not a legal target for the create
/// and remove operations.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("/", path),
    }
}

/// Resolves an absolute path to an inode index, walking directory entries
/// from the root.
///
/// Directory pages and the inode region are mirrored, so every read uses
/// disk 0. Only direct pages are consulted; directories keep their entries in
/// direct pages.
pub fn resolve(sb: &Superblock, disks: &[DiskMap], path: &str) -> Result<u64, Error> {
    let mut current = ROOT_INODE;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        let inode = read_inode(sb, disks, current);
        if !inode.is_directory() {
            return Err(Error::NotADirectory);
        }
        current = lookup(sb, disks, &inode, component.as_bytes())?;
    }
    Ok(current)
}

/// Finds `name` among the directory's entries, scanning direct pages in
/// order.
fn lookup(sb: &Superblock, disks: &[DiskMap], dir: &Inode, name: &[u8]) -> Result<u64, Error> {
    let image = disks[0].bytes();
    for b in &dir.blocks[..D_BLOCK] {
        if *b < 0 {
            continue;
        }
        let off = sb.block_off(sb.mode.dir_local(*b, sb.num_disks));
        for slot in image[off..off + BLOCK_SIZE].chunks_exact(DirectoryEntry::SIZE) {
            let entry = DirectoryEntry::decode(slot);
            if !entry.is_free() && entry.name() == name {
                return Ok(entry.num as u64);
            }
        }
    }
    Err(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn split_nested() {
        assert_eq!(split("/a/b/c"), ("/a/b", "c"));
        assert_eq!(split("/a/b"), ("/a", "b"));
    }

    #[test]
    pub fn split_top_level() {
        assert_eq!(split("/a"), ("/", "a"));
        assert_eq!(split("/"), ("/", ""));
    }
}

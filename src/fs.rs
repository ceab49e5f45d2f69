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

//! Filesystem operations over a mounted set of disks.
//!
//! [`Fs`] is the context every operation runs against: it owns the disk
//! mappings and the decoded superblock. Operations execute one at a time to
//! completion (they take `&mut self`); there is no suspension point and no
//! shared mutable state outside the context.
//!
//! Within an operation the order is: allocate (bitmaps commit at allocation
//! time), write data, then mirror the updated inode to every disk as the
//! final step. If an operation fails after mutating some disks, the replicas
//! can diverge; there is no rollback.

use crate::alloc;
use crate::directory_entry::DirectoryEntry;
use crate::disk::DiskMap;
use crate::error::Error;
use crate::inode::{IndirectBlock, Inode, read_inode, unix_timestamp, write_inode};
use crate::path::{self, ROOT_INODE};
use crate::superblock::Superblock;
use crate::{BLOCK_SIZE, D_BLOCK, IND_BLOCK, PTRS_PER_BLOCK};
use std::path::Path;

/// File attributes returned by [`Fs::getattr`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stat {
    /// File type and permission bits.
    pub mode: u32,
    /// The number of links.
    pub nlink: u32,
    /// Logical size in bytes.
    pub size: i64,
    /// The owning user.
    pub uid: u32,
    /// The owning group.
    pub gid: u32,
    /// Last access time, in whole seconds since the Unix epoch.
    pub atime: i64,
    /// Last content modification time.
    pub mtime: i64,
    /// Last metadata change time.
    pub ctime: i64,
}

/// A mounted filesystem.
pub struct Fs {
    /// The superblock, decoded from disk 0.
    sb: Superblock,
    /// The mapped backing disks, ordered by disk index.
    disks: Vec<DiskMap>,
}

impl Fs {
    /// Maps every backing disk and validates the superblock replicas.
    ///
    /// The paths must be given in disk order. Fails with
    /// [`Error::InvalidArgument`] when a disk does not carry a valid image,
    /// the disk count does not match the superblock, a disk's recorded index
    /// does not match its position, or a mapping is smaller than the image.
    pub fn mount<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        if paths.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let mut disks = Vec::with_capacity(paths.len());
        for path in paths {
            disks.push(DiskMap::open(path.as_ref())?);
        }
        let sb = Superblock::decode(disks[0].bytes())?;
        if sb.num_disks as usize != disks.len() {
            return Err(Error::InvalidArgument);
        }
        for (i, disk) in disks.iter().enumerate() {
            if disk.len() < sb.image_size() {
                return Err(Error::InvalidArgument);
            }
            let mut replica = Superblock::decode(disk.bytes())?;
            if replica.disk_index as usize != i {
                return Err(Error::InvalidArgument);
            }
            replica.disk_index = sb.disk_index;
            if replica != sb {
                return Err(Error::InvalidArgument);
            }
        }
        Ok(Self { sb, disks })
    }

    /// Returns the superblock of the mounted image.
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    /// Returns the attributes of the file at `path`.
    pub fn getattr(&self, path: &str) -> Result<Stat, Error> {
        let idx = path::resolve(&self.sb, &self.disks, path)?;
        let inode = read_inode(&self.sb, &self.disks, idx);
        Ok(Stat {
            mode: inode.mode,
            nlink: inode.nlinks,
            size: inode.size,
            uid: inode.uid,
            gid: inode.gid,
            atime: inode.atim,
            mtime: inode.mtim,
            ctime: inode.ctim,
        })
    }

    /// Creates a regular file at `path` with the given permission bits.
    pub fn mknod(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        self.create(path, |num| Inode::new_file(num, mode))
    }

    /// Creates a directory at `path` with the given permission bits.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), Error> {
        self.create(path, |num| Inode::new_directory(num, mode))
    }

    fn create(&mut self, path: &str, build: impl FnOnce(u32) -> Inode) -> Result<(), Error> {
        let sb = self.sb;
        let (parent_path, name) = path::split(path);
        let parent_idx = path::resolve(&sb, &self.disks, parent_path)?;
        // resolving the full path also vetted every ancestor, the parent
        // included, as a directory
        match path::resolve(&sb, &self.disks, path) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        let child_idx = alloc::alloc_inode(&sb, &mut self.disks)?;
        let child = build(child_idx as u32);
        self.insert_entry(parent_idx, name, child_idx as i32)?;
        write_inode(&sb, &mut self.disks, &child);
        Ok(())
    }

    /// Removes the file at `path`, releasing its inode and data blocks once
    /// the link count reaches zero.
    pub fn unlink(&mut self, path: &str) -> Result<(), Error> {
        let sb = self.sb;
        let target_idx = path::resolve(&sb, &self.disks, path)?;
        let mut target = read_inode(&sb, &self.disks, target_idx);
        if target.is_directory() {
            return Err(Error::IsADirectory);
        }
        let (parent_path, _) = path::split(path);
        let parent_idx = path::resolve(&sb, &self.disks, parent_path)?;
        self.remove_entry(parent_idx, target_idx)?;
        target.nlinks -= 1;
        if target.nlinks == 0 {
            self.release_inode(&target);
        } else {
            write_inode(&sb, &mut self.disks, &target);
        }
        Ok(())
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<(), Error> {
        let sb = self.sb;
        let target_idx = path::resolve(&sb, &self.disks, path)?;
        if target_idx == ROOT_INODE {
            return Err(Error::Busy);
        }
        let target = read_inode(&sb, &self.disks, target_idx);
        if !target.is_directory() {
            return Err(Error::NotADirectory);
        }
        let image = self.disks[0].bytes();
        for b in &target.blocks[..D_BLOCK] {
            if *b < 0 {
                continue;
            }
            let off = sb.block_off(sb.mode.dir_local(*b, sb.num_disks));
            for slot in image[off..off + BLOCK_SIZE].chunks_exact(DirectoryEntry::SIZE) {
                let entry = DirectoryEntry::decode(slot);
                if !entry.is_free() && entry.name() != b"." && entry.name() != b".." {
                    return Err(Error::NotEmpty);
                }
            }
        }
        let (parent_path, _) = path::split(path);
        let parent_idx = path::resolve(&sb, &self.disks, parent_path)?;
        self.remove_entry(parent_idx, target_idx)?;
        self.release_inode(&target);
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from the file at `path`, starting at
    /// `offset`. Returns the number of bytes read, which is short when the
    /// range reaches past the end of the file or into an unallocated block.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: i64) -> Result<usize, Error> {
        if offset < 0 {
            return Err(Error::InvalidArgument);
        }
        let sb = self.sb;
        let idx = path::resolve(&sb, &self.disks, path)?;
        let mut inode = read_inode(&sb, &self.disks, idx);
        if inode.is_directory() {
            return Err(Error::IsADirectory);
        }
        if offset >= inode.size {
            return Ok(0);
        }
        let len = buf.len().min((inode.size - offset) as usize);
        let mut done = 0;
        while done < len {
            let pos = offset as u64 + done as u64;
            let logical = (pos / BLOCK_SIZE as u64) as usize;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let Some(block) = self.lookup_block(&inode, logical) else {
                break;
            };
            let chunk = (BLOCK_SIZE - in_block).min(len - done);
            let site = sb.mode.locate(block, sb.num_disks);
            let off = sb.block_off(site.local) + in_block;
            buf[done..done + chunk].copy_from_slice(&self.disks[site.disk].bytes()[off..off + chunk]);
            done += chunk;
        }
        inode.atim = unix_timestamp();
        write_inode(&sb, &mut self.disks, &inode);
        Ok(done)
    }

    /// Writes `buf` into the file at `path` starting at `offset`, allocating
    /// data blocks (and the indirect page) on demand. Returns the number of
    /// bytes written.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: i64) -> Result<usize, Error> {
        if offset < 0 {
            return Err(Error::InvalidArgument);
        }
        let sb = self.sb;
        let idx = path::resolve(&sb, &self.disks, path)?;
        let mut inode = read_inode(&sb, &self.disks, idx);
        if inode.is_directory() {
            return Err(Error::IsADirectory);
        }
        let mut done = 0;
        while done < buf.len() {
            let pos = offset as u64 + done as u64;
            let logical = (pos / BLOCK_SIZE as u64) as usize;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let block = self.map_block(&mut inode, logical)?;
            let chunk = (BLOCK_SIZE - in_block).min(buf.len() - done);
            for site in sb.mode.replicas(block, sb.num_disks) {
                let off = sb.block_off(site.local) + in_block;
                self.disks[site.disk].bytes_mut()[off..off + chunk]
                    .copy_from_slice(&buf[done..done + chunk]);
            }
            done += chunk;
        }
        if offset + done as i64 > inode.size {
            inode.size = offset + done as i64;
        }
        inode.mtim = unix_timestamp();
        write_inode(&sb, &mut self.disks, &inode);
        Ok(done)
    }

    /// Lists the directory at `path`, invoking `filler` once per entry. The
    /// pseudo-entries `.` and `..` are always emitted first. Listing stops
    /// early when `filler` returns `false`.
    pub fn readdir(&self, path: &str, mut filler: impl FnMut(&str) -> bool) -> Result<(), Error> {
        let sb = self.sb;
        let idx = path::resolve(&sb, &self.disks, path)?;
        let inode = read_inode(&sb, &self.disks, idx);
        if !inode.is_directory() {
            return Err(Error::NotADirectory);
        }
        if !filler(".") || !filler("..") {
            return Ok(());
        }
        if inode.blocks[0] < 0 {
            return Ok(());
        }
        let base = sb.block_off(sb.mode.dir_local(inode.blocks[0], sb.num_disks));
        let image = self.disks[0].bytes();
        let end = (inode.size as usize).min(BLOCK_SIZE);
        let mut off = 0;
        while off < end {
            let entry = DirectoryEntry::decode(&image[base + off..base + off + DirectoryEntry::SIZE]);
            if !entry.name().is_empty() {
                let name = String::from_utf8_lossy(entry.name());
                if !filler(&name) {
                    break;
                }
            }
            off += DirectoryEntry::SIZE;
        }
        Ok(())
    }

    /// Returns the data block backing logical block `logical` of the inode,
    /// if it is mapped.
    fn lookup_block(&self, inode: &Inode, logical: usize) -> Option<i64> {
        if logical < D_BLOCK {
            let b = inode.blocks[logical];
            (b >= 0).then_some(b)
        } else if logical < D_BLOCK + PTRS_PER_BLOCK {
            let ind = inode.blocks[IND_BLOCK];
            if ind < 0 {
                return None;
            }
            let b = self.read_indirect(ind).entries[logical - D_BLOCK];
            (b >= 0).then_some(b)
        } else {
            None
        }
    }

    /// Returns the data block backing logical block `logical`, allocating the
    /// block and the indirect page on demand. Fresh blocks are zeroed at
    /// every replica.
    fn map_block(&mut self, inode: &mut Inode, logical: usize) -> Result<i64, Error> {
        let sb = self.sb;
        if logical < D_BLOCK {
            if inode.blocks[logical] < 0 {
                inode.blocks[logical] = self.alloc_zeroed()?;
            }
            return Ok(inode.blocks[logical]);
        }
        if logical >= D_BLOCK + PTRS_PER_BLOCK {
            return Err(Error::FileTooBig);
        }
        if inode.blocks[IND_BLOCK] < 0 {
            let page = self.alloc_zeroed()?;
            self.write_indirect(page, &IndirectBlock::new());
            inode.blocks[IND_BLOCK] = page;
        }
        let ind = inode.blocks[IND_BLOCK];
        let mut page = self.read_indirect(ind);
        let slot = logical - D_BLOCK;
        if page.entries[slot] < 0 {
            page.entries[slot] = self.alloc_zeroed()?;
            self.write_indirect(ind, &page);
        }
        Ok(page.entries[slot])
    }

    /// Allocates a data block and zeroes it at every replica.
    fn alloc_zeroed(&mut self) -> Result<i64, Error> {
        let sb = self.sb;
        let b = alloc::alloc_block(&sb, &mut self.disks)?;
        for site in sb.mode.replicas(b, sb.num_disks) {
            let off = sb.block_off(site.local);
            self.disks[site.disk].bytes_mut()[off..off + BLOCK_SIZE].fill(0);
        }
        Ok(b)
    }

    /// Decodes the indirect page at data block `ind` from its authoritative
    /// replica.
    fn read_indirect(&self, ind: i64) -> IndirectBlock {
        let sb = &self.sb;
        let site = sb.mode.locate(ind, sb.num_disks);
        let off = sb.block_off(site.local);
        IndirectBlock::decode(&self.disks[site.disk].bytes()[off..off + BLOCK_SIZE])
    }

    /// Encodes the indirect page into every replica of data block `ind`.
    fn write_indirect(&mut self, ind: i64, page: &IndirectBlock) {
        let sb = self.sb;
        for site in sb.mode.replicas(ind, sb.num_disks) {
            let off = sb.block_off(site.local);
            page.encode(&mut self.disks[site.disk].bytes_mut()[off..off + BLOCK_SIZE]);
        }
    }

    /// Allocates a directory page and zeroes it on every disk.
    fn alloc_dir_page_zeroed(&mut self) -> Result<i64, Error> {
        let sb = self.sb;
        let page = alloc::alloc_dir_page(&sb, &mut self.disks)?;
        for site in sb.mode.dir_replicas(page, sb.num_disks) {
            let off = sb.block_off(site.local);
            self.disks[site.disk].bytes_mut()[off..off + BLOCK_SIZE].fill(0);
        }
        Ok(page)
    }

    /// Inserts an entry for `child` into the parent directory, allocating a
    /// fresh page when every existing one is full. The entry and the updated
    /// parent inode are committed to every disk.
    fn insert_entry(&mut self, parent_idx: u64, name: &str, child: i32) -> Result<(), Error> {
        let sb = self.sb;
        let mut parent = read_inode(&sb, &self.disks, parent_idx);
        let mut free_ptr = None;
        let mut slot = None;
        for i in 0..D_BLOCK {
            let b = parent.blocks[i];
            if b < 0 {
                free_ptr = Some(i);
                break;
            }
            let off = sb.block_off(sb.mode.dir_local(b, sb.num_disks));
            let found = self.disks[0].bytes()[off..off + BLOCK_SIZE]
                .chunks_exact(DirectoryEntry::SIZE)
                .position(|s| DirectoryEntry::decode(s).is_free());
            if let Some(j) = found {
                slot = Some((b, j));
                break;
            }
        }
        let (page, entry_slot) = if let Some((page, j)) = slot {
            (page, j)
        } else if let Some(i) = free_ptr {
            let page = self.alloc_dir_page_zeroed()?;
            parent.blocks[i] = page;
            (page, 0)
        } else {
            return Err(Error::NoSpace);
        };
        let entry = DirectoryEntry::new(name, child);
        let base =
            sb.block_off(sb.mode.dir_local(page, sb.num_disks)) + entry_slot * DirectoryEntry::SIZE;
        for disk in self.disks.iter_mut() {
            entry.encode(&mut disk.bytes_mut()[base..base + DirectoryEntry::SIZE]);
        }
        parent.nlinks += 1;
        parent.size += DirectoryEntry::SIZE as i64;
        write_inode(&sb, &mut self.disks, &parent);
        Ok(())
    }

    /// Zeroes the entry referencing `child` in the parent's pages on every
    /// disk, and shrinks the parent once.
    fn remove_entry(&mut self, parent_idx: u64, child: u64) -> Result<(), Error> {
        let sb = self.sb;
        let mut parent = read_inode(&sb, &self.disks, parent_idx);
        let mut site = None;
        'pages: for b in &parent.blocks[..D_BLOCK] {
            if *b < 0 {
                continue;
            }
            let off = sb.block_off(sb.mode.dir_local(*b, sb.num_disks));
            for j in 0..BLOCK_SIZE / DirectoryEntry::SIZE {
                let s = off + j * DirectoryEntry::SIZE;
                let entry = DirectoryEntry::decode(&self.disks[0].bytes()[s..s + DirectoryEntry::SIZE]);
                if !entry.is_free() && entry.num as u64 == child {
                    site = Some(s);
                    break 'pages;
                }
            }
        }
        let Some(s) = site else {
            return Err(Error::NotFound);
        };
        for disk in self.disks.iter_mut() {
            disk.bytes_mut()[s..s + DirectoryEntry::SIZE].fill(0);
        }
        parent.nlinks -= 1;
        parent.size -= DirectoryEntry::SIZE as i64;
        write_inode(&sb, &mut self.disks, &parent);
        Ok(())
    }

    /// Frees every data block the inode references, clears its bitmap bit and
    /// zeroes its slot on every disk.
    fn release_inode(&mut self, inode: &Inode) {
        let sb = self.sb;
        if inode.is_directory() {
            for b in &inode.blocks[..D_BLOCK] {
                if *b < 0 {
                    continue;
                }
                alloc::free_dir_page(&sb, &mut self.disks, *b as u64);
                for site in sb.mode.dir_replicas(*b, sb.num_disks) {
                    let off = sb.block_off(site.local);
                    self.disks[site.disk].bytes_mut()[off..off + BLOCK_SIZE].fill(0);
                }
            }
        } else {
            let mut blocks: Vec<i64> = inode.blocks[..D_BLOCK]
                .iter()
                .copied()
                .filter(|b| *b >= 0)
                .collect();
            let ind = inode.blocks[IND_BLOCK];
            if ind >= 0 {
                blocks.extend(self.read_indirect(ind).entries.iter().filter(|e| **e >= 0));
                blocks.push(ind);
            }
            for b in blocks {
                alloc::free_block(&sb, &mut self.disks, b as u64);
                for site in sb.mode.replicas(b, sb.num_disks) {
                    let off = sb.block_off(site.local);
                    self.disks[site.disk].bytes_mut()[off..off + BLOCK_SIZE].fill(0);
                }
            }
        }
        alloc::free_inode(&sb, &mut self.disks, inode.num as u64);
        let off = sb.inode_off(inode.num as u64);
        for disk in self.disks.iter_mut() {
            disk.bytes_mut()[off..off + BLOCK_SIZE].fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{self, FormatOptions};
    use crate::inode::MODE_DIRECTORY;
    use crate::raid::RaidMode;
    use crate::{MAX_NAME, bitmap};
    use std::fs::File;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn make_disks(dir: &TempDir, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("disk{i}"));
                let file = File::create(&path).unwrap();
                file.set_len(1 << 20).unwrap();
                path
            })
            .collect()
    }

    fn fixture(count: usize, mode: RaidMode) -> (TempDir, Fs) {
        let dir = tempfile::tempdir().unwrap();
        let paths = make_disks(&dir, count);
        let opts = FormatOptions {
            mode,
            num_inodes: 32,
            num_data_blocks: 64,
        };
        format::format(&paths, &opts).unwrap();
        let fs = Fs::mount(&paths).unwrap();
        (dir, fs)
    }

    fn list(fs: &Fs, path: &str) -> Vec<String> {
        let mut names = Vec::new();
        fs.readdir(path, |name| {
            names.push(name.to_owned());
            true
        })
        .unwrap();
        names
    }

    #[test]
    pub fn mkdir_sets_directory_attributes() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        let stat = fs.getattr("/a").unwrap();
        assert_ne!(stat.mode & MODE_DIRECTORY, 0);
        assert_eq!(stat.mode & 0o777, 0o755);
        assert_eq!(stat.nlink, 2);
        assert_eq!(stat.size, 0);
    }

    #[test]
    pub fn create_write_read_round_trip() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/f", 0o644).unwrap();
        assert_eq!(fs.write("/a/f", b"hello", 0).unwrap(), 5);
        let mut buf = [0u8; 5];
        assert_eq!(fs.read("/a/f", &mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(fs.getattr("/a/f").unwrap().size, 5);
    }

    #[test]
    pub fn overwrite_keeps_size() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", b"hello", 0).unwrap();
        fs.write("/f", b"HE", 0).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"HEllo");
        assert_eq!(fs.getattr("/f").unwrap().size, 5);
    }

    #[test]
    pub fn write_within_direct_range_keeps_indirect_unused() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/f", 0o644).unwrap();
        let len = BLOCK_SIZE * 14 + 100;
        fs.write("/a/f", &vec![0u8; len], 0).unwrap();
        assert_eq!(fs.getattr("/a/f").unwrap().size, len as i64);
        let mut buf = [0xffu8; 100];
        let off = (BLOCK_SIZE * 13 + 50) as i64;
        assert_eq!(fs.read("/a/f", &mut buf, off).unwrap(), 100);
        assert!(buf.iter().all(|b| *b == 0));
        let idx = path::resolve(&fs.sb, &fs.disks, "/a/f").unwrap();
        let inode = read_inode(&fs.sb, &fs.disks, idx);
        assert_eq!(inode.blocks[IND_BLOCK], -1);
    }

    #[test]
    pub fn write_past_direct_range_allocates_indirect() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        let off = (BLOCK_SIZE * 16) as i64;
        assert_eq!(fs.write("/f", b"x", off).unwrap(), 1);
        let mut buf = [0u8; 1];
        assert_eq!(fs.read("/f", &mut buf, off).unwrap(), 1);
        assert_eq!(&buf, b"x");
        assert_eq!(fs.getattr("/f").unwrap().size, off + 1);
        let idx = path::resolve(&fs.sb, &fs.disks, "/f").unwrap();
        let inode = read_inode(&fs.sb, &fs.disks, idx);
        assert_ne!(inode.blocks[IND_BLOCK], -1);
    }

    #[test]
    pub fn read_stops_at_unallocated_block() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", b"tail", (BLOCK_SIZE * 2) as i64).unwrap();
        // logical blocks 0 and 1 are holes, so the read comes back empty
        let mut buf = [0u8; 16];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 0);
    }

    #[test]
    pub fn read_past_end_returns_nothing() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", b"abc", 0).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read("/f", &mut buf, 10).unwrap(), 0);
        assert_eq!(fs.read("/f", &mut buf, 1).unwrap(), 2);
        assert_eq!(&buf[..2], b"bc");
    }

    #[test]
    pub fn write_past_indirect_range_is_too_big() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        let off = (BLOCK_SIZE * (D_BLOCK + PTRS_PER_BLOCK)) as i64;
        assert!(matches!(fs.write("/f", b"x", off), Err(Error::FileTooBig)));
    }

    #[test]
    pub fn mkdir_twice_reports_exists() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        assert!(matches!(fs.mkdir("/a", 0o755), Err(Error::AlreadyExists)));
        assert!(matches!(fs.mknod("/a", 0o644), Err(Error::AlreadyExists)));
    }

    #[test]
    pub fn create_in_missing_parent_fails() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        assert!(matches!(fs.mknod("/a/f", 0o644), Err(Error::NotFound)));
        fs.mknod("/f", 0o644).unwrap();
        assert!(matches!(
            fs.mknod("/f/x", 0o644),
            Err(Error::NotADirectory)
        ));
    }

    #[test]
    pub fn unlink_and_rmdir_type_checks() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/f", 0o644).unwrap();
        assert!(matches!(fs.unlink("/a"), Err(Error::IsADirectory)));
        assert!(matches!(fs.rmdir("/f"), Err(Error::NotADirectory)));
        assert!(matches!(fs.rmdir("/"), Err(Error::Busy)));
        assert!(matches!(fs.unlink("/missing"), Err(Error::NotFound)));
    }

    #[test]
    pub fn rmdir_requires_empty_directory() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mkdir("/a/sub", 0o755).unwrap();
        fs.mknod("/a/sub/f", 0o644).unwrap();
        assert!(matches!(fs.rmdir("/a/sub"), Err(Error::NotEmpty)));
        fs.unlink("/a/sub/f").unwrap();
        fs.rmdir("/a/sub").unwrap();
        assert!(matches!(fs.getattr("/a/sub"), Err(Error::NotFound)));
    }

    #[test]
    pub fn parent_bookkeeping_on_create_and_remove() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/f", 0o644).unwrap();
        let stat = fs.getattr("/a").unwrap();
        assert_eq!(stat.nlink, 3);
        assert_eq!(stat.size, DirectoryEntry::SIZE as i64);
        fs.unlink("/a/f").unwrap();
        let stat = fs.getattr("/a").unwrap();
        assert_eq!(stat.nlink, 2);
        assert_eq!(stat.size, 0);
    }

    #[test]
    pub fn unlink_releases_inode_and_blocks() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", &vec![0xabu8; BLOCK_SIZE * 2], 0).unwrap();
        let idx = path::resolve(&fs.sb, &fs.disks, "/f").unwrap();
        let inode = read_inode(&fs.sb, &fs.disks, idx);
        let data_blocks: Vec<i64> = inode.blocks.iter().copied().filter(|b| *b >= 0).collect();
        assert_eq!(data_blocks.len(), 2);

        fs.unlink("/f").unwrap();
        assert!(matches!(fs.getattr("/f"), Err(Error::NotFound)));
        for disk in &fs.disks {
            let image = disk.bytes();
            assert!(!bitmap::get(&image[fs.sb.i_bitmap_range()], idx));
            for b in &data_blocks {
                assert!(!bitmap::get(&image[fs.sb.d_bitmap_range()], *b as u64));
                let off = fs.sb.block_off(*b as u64);
                assert!(image[off..off + BLOCK_SIZE].iter().all(|x| *x == 0));
            }
            let off = fs.sb.inode_off(idx);
            assert!(image[off..off + BLOCK_SIZE].iter().all(|x| *x == 0));
        }
    }

    #[test]
    pub fn unlink_releases_indirect_blocks() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", b"x", (BLOCK_SIZE * 20) as i64).unwrap();
        let idx = path::resolve(&fs.sb, &fs.disks, "/f").unwrap();
        let inode = read_inode(&fs.sb, &fs.disks, idx);
        let ind = inode.blocks[IND_BLOCK];
        assert!(ind >= 0);
        let data = fs.read_indirect(ind).entries[20 - D_BLOCK];
        assert!(data >= 0);

        fs.unlink("/f").unwrap();
        let image = fs.disks[0].bytes();
        assert!(!bitmap::get(&image[fs.sb.d_bitmap_range()], ind as u64));
        assert!(!bitmap::get(&image[fs.sb.d_bitmap_range()], data as u64));
    }

    #[test]
    pub fn readdir_lists_entries() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/x", 0o644).unwrap();
        fs.mknod("/a/y", 0o644).unwrap();
        assert_eq!(list(&fs, "/a"), vec![".", "..", "x", "y"]);
        fs.unlink("/a/y").unwrap();
        assert_eq!(list(&fs, "/a"), vec![".", "..", "x"]);
    }

    #[test]
    pub fn readdir_reuses_freed_slots() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/x", 0o644).unwrap();
        fs.mknod("/y", 0o644).unwrap();
        fs.unlink("/x").unwrap();
        fs.mknod("/z", 0o644).unwrap();
        // the freed slot is the first free one, so z takes x's place
        assert_eq!(list(&fs, "/"), vec![".", "..", "z", "y"]);
    }

    #[test]
    pub fn readdir_stops_when_filler_declines() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/x", 0o644).unwrap();
        fs.mknod("/y", 0o644).unwrap();
        let mut names = Vec::new();
        fs.readdir("/", |name| {
            names.push(name.to_owned());
            names.len() < 3
        })
        .unwrap();
        assert_eq!(names, vec![".", "..", "x"]);
    }

    #[test]
    pub fn readdir_rejects_files() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mknod("/f", 0o644).unwrap();
        assert!(matches!(
            fs.readdir("/f", |_| true),
            Err(Error::NotADirectory)
        ));
    }

    #[test]
    pub fn long_entry_names_are_truncated() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        let long = format!("/{}", "n".repeat(MAX_NAME + 4));
        fs.mknod(&long, 0o644).unwrap();
        let truncated = format!("/{}", "n".repeat(MAX_NAME - 1));
        assert!(fs.getattr(&truncated).is_ok());
    }

    #[test]
    pub fn inode_exhaustion_reports_no_space() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        // slot 0 belongs to the root, leaving 31 inodes
        for i in 0..31 {
            fs.mknod(&format!("/f{i}"), 0o644).unwrap();
        }
        assert!(matches!(fs.mknod("/one-more", 0o644), Err(Error::NoSpace)));
    }

    #[test]
    pub fn inode_regions_and_bitmaps_stay_identical() {
        for mode in [RaidMode::Stripe, RaidMode::Mirror] {
            let (_dir, mut fs) = fixture(3, mode);
            fs.mkdir("/a", 0o755).unwrap();
            fs.mknod("/a/f", 0o644).unwrap();
            fs.write("/a/f", &vec![7u8; BLOCK_SIZE * 3 + 17], 0).unwrap();
            let mut buf = [0u8; 64];
            fs.read("/a/f", &mut buf, 100).unwrap();
            fs.mknod("/a/g", 0o644).unwrap();
            fs.unlink("/a/g").unwrap();

            let sb = fs.sb;
            let reference = fs.disks[0].bytes();
            for disk in &fs.disks[1..] {
                let image = disk.bytes();
                assert_eq!(
                    image[sb.i_blocks_ptr as usize..sb.d_blocks_ptr as usize],
                    reference[sb.i_blocks_ptr as usize..sb.d_blocks_ptr as usize],
                );
                assert_eq!(image[sb.i_bitmap_range()], reference[sb.i_bitmap_range()]);
                assert_eq!(image[sb.d_bitmap_range()], reference[sb.d_bitmap_range()]);
            }
        }
    }

    #[test]
    pub fn mirror_disks_hold_identical_images() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/f", 0o644).unwrap();
        fs.write("/a/f", &vec![0x5au8; BLOCK_SIZE + 9], 0).unwrap();

        let reference = fs.disks[0].bytes();
        for disk in &fs.disks[1..] {
            let image = disk.bytes();
            // the images only differ in the superblock's disk index field
            assert_eq!(image[..60], reference[..60]);
            assert_eq!(image[64..], reference[64..]);
        }
    }

    #[test]
    pub fn stripe_write_places_chunks_round_robin() {
        let (_dir, mut fs) = fixture(3, RaidMode::Stripe);
        fs.mknod("/f", 0o644).unwrap();
        let pattern: Vec<u8> = (0..BLOCK_SIZE * 3).map(|i| (i / BLOCK_SIZE) as u8 + 1).collect();
        fs.write("/f", &pattern, 0).unwrap();

        let sb = fs.sb;
        let idx = path::resolve(&sb, &fs.disks, "/f").unwrap();
        let inode = read_inode(&sb, &fs.disks, idx);
        for logical in 0..3 {
            let b = inode.blocks[logical];
            assert!(b >= 0);
            let site = sb.mode.locate(b, sb.num_disks);
            assert_eq!(site.disk, (b % 3) as usize);
            let off = sb.block_off(site.local);
            let expect = &pattern[logical * BLOCK_SIZE..(logical + 1) * BLOCK_SIZE];
            assert_eq!(&fs.disks[site.disk].bytes()[off..off + BLOCK_SIZE], expect);
        }
        // consecutive blocks land on consecutive disks
        let disks: Vec<usize> = (0..3)
            .map(|i| sb.mode.locate(inode.blocks[i], sb.num_disks).disk)
            .collect();
        assert_eq!(disks, vec![0, 1, 2]);

        let mut buf = vec![0u8; pattern.len()];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), pattern.len());
        assert_eq!(buf, pattern);
    }

    #[test]
    pub fn stripe_single_block_leaves_other_disks_zero() {
        let (_dir, mut fs) = fixture(3, RaidMode::Stripe);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", &vec![0xe1u8; BLOCK_SIZE], 0).unwrap();

        let sb = fs.sb;
        let idx = path::resolve(&sb, &fs.disks, "/f").unwrap();
        let inode = read_inode(&sb, &fs.disks, idx);
        let b = inode.blocks[0];
        let site = sb.mode.locate(b, sb.num_disks);
        let off = sb.block_off(site.local);
        for (d, disk) in fs.disks.iter().enumerate() {
            let slot = &disk.bytes()[off..off + BLOCK_SIZE];
            if d == site.disk {
                assert!(slot.iter().all(|x| *x == 0xe1));
            } else {
                assert!(slot.iter().all(|x| *x == 0));
            }
        }
    }

    #[test]
    pub fn stripe_directories_are_readable_after_removals() {
        let (_dir, mut fs) = fixture(2, RaidMode::Stripe);
        fs.mkdir("/a", 0o755).unwrap();
        fs.mknod("/a/f", 0o644).unwrap();
        fs.write("/a/f", b"payload", 0).unwrap();
        assert_eq!(list(&fs, "/a"), vec![".", "..", "f"]);
        fs.unlink("/a/f").unwrap();
        fs.rmdir("/a").unwrap();
        assert_eq!(list(&fs, "/"), vec![".", ".."]);
        // the freed pages and rows are reusable
        fs.mkdir("/b", 0o755).unwrap();
        fs.mknod("/b/g", 0o644).unwrap();
        fs.write("/b/g", b"again", 0).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read("/b/g", &mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"again");
    }

    #[test]
    pub fn stripe_indirect_write_round_trip() {
        let (_dir, mut fs) = fixture(3, RaidMode::Stripe);
        fs.mknod("/f", 0o644).unwrap();
        let off = (BLOCK_SIZE * (D_BLOCK + 5)) as i64;
        fs.write("/f", b"deep", off).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read("/f", &mut buf, off).unwrap(), 4);
        assert_eq!(&buf, b"deep");
    }

    #[test]
    pub fn verified_mirror_behaves_like_mirror() {
        let (_dir, mut fs) = fixture(2, RaidMode::VerifiedMirror);
        fs.mknod("/f", 0o644).unwrap();
        fs.write("/f", b"checked", 0).unwrap();
        let mut buf = [0u8; 7];
        assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 7);
        assert_eq!(&buf, b"checked");
        let reference = fs.disks[0].bytes();
        let image = fs.disks[1].bytes();
        assert_eq!(image[64..], reference[64..]);
    }

    #[test]
    pub fn mount_validates_images() {
        let dir = tempfile::tempdir().unwrap();
        let paths = make_disks(&dir, 2);
        assert!(matches!(
            Fs::mount(&paths),
            Err(Error::InvalidArgument)
        ));

        let opts = FormatOptions {
            mode: RaidMode::Mirror,
            num_inodes: 32,
            num_data_blocks: 64,
        };
        format::format(&paths, &opts).unwrap();
        Fs::mount(&paths).unwrap();
        // the disk count and order must match the formatted image
        assert!(matches!(
            Fs::mount(&paths[..1]),
            Err(Error::InvalidArgument)
        ));
        let swapped = [paths[1].clone(), paths[0].clone()];
        assert!(matches!(
            Fs::mount(&swapped),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    pub fn root_is_not_a_creation_target() {
        let (_dir, mut fs) = fixture(2, RaidMode::Mirror);
        assert!(matches!(fs.mkdir("/", 0o755), Err(Error::AlreadyExists)));
        assert!(matches!(fs.unlink("/"), Err(Error::IsADirectory)));
    }

    #[test]
    pub fn getattr_reports_root_directory() {
        let (_dir, fs) = fixture(2, RaidMode::Mirror);
        let stat = fs.getattr("/").unwrap();
        assert_ne!(stat.mode & MODE_DIRECTORY, 0);
        assert_eq!(stat.nlink, 2);
    }
}

//! Memory-mapped backing disks.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr;
use std::slice;

/// One backing file mapped read-write into the process.
///
/// Every write mutates the mapping in place; the kernel writes the pages back
/// to the file. [`DiskMap::sync`] forces a synchronous flush.
pub struct DiskMap {
    ptr: *mut u8,
    len: usize,
}

impl DiskMap {
    /// Opens the backing file at `path` and maps it whole.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        Self::map(&file, len)
    }

    /// Opens the backing file at `path` and maps its first `len` bytes.
    pub fn open_len(path: &Path, len: usize) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::map(&file, len)
    }

    fn map(file: &File, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            ptr: ptr as *mut u8,
            len,
        })
    }

    /// Returns the mapping length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Tells whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the mapped image bytes.
    pub fn bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Returns the mapped image bytes, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Synchronously flushes the mapping to the backing file.
    pub fn sync(&self) -> io::Result<()> {
        let ret = unsafe { libc::msync(self.ptr as *mut _, self.len, libc::MS_SYNC) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for DiskMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut _, self.len);
        }
    }
}

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

//! Errors returned by filesystem operations and by the formatter.

use std::io;
use thiserror::Error;

/// An error raised by a filesystem operation.
///
/// Every variant maps to a standard errno value through [`Error::errno`] so a
/// kernel-side adapter can report it as a negated error code.
#[derive(Debug, Error)]
pub enum Error {
    /// A path or one of its components does not exist.
    #[error("no such file or directory")]
    NotFound,
    /// A path component used as a directory is not one.
    #[error("not a directory")]
    NotADirectory,
    /// The operation targets a directory but only accepts files.
    #[error("is a directory")]
    IsADirectory,
    /// The path to create already exists.
    #[error("file exists")]
    AlreadyExists,
    /// The directory to remove still has entries.
    #[error("directory not empty")]
    NotEmpty,
    /// Every inode slot, data block or parent entry slot is taken.
    #[error("no space left on device")]
    NoSpace,
    /// A write reaches past the indirect block's addressing range.
    #[error("file too large")]
    FileTooBig,
    /// The operation targets a resource the filesystem cannot release.
    #[error("device or resource busy")]
    Busy,
    /// An invalid RAID mode token, or a backing file that does not carry a
    /// valid filesystem image.
    #[error("invalid argument")]
    InvalidArgument,
    /// A backing file is smaller than the computed image size.
    #[error("disk is too small for the requested image")]
    DiskTooSmall,
    /// An I/O failure while opening, mapping or flushing a backing file.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the matching errno value, as a positive integer.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::NotADirectory => libc::ENOTDIR,
            Self::IsADirectory => libc::EISDIR,
            Self::AlreadyExists => libc::EEXIST,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::NoSpace | Self::DiskTooSmall => libc::ENOSPC,
            Self::FileTooBig => libc::EFBIG,
            Self::Busy => libc::EBUSY,
            Self::InvalidArgument => libc::EINVAL,
            Self::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn errno_mapping() {
        assert_eq!(Error::NotFound.errno(), libc::ENOENT);
        assert_eq!(Error::NoSpace.errno(), libc::ENOSPC);
        assert_eq!(Error::DiskTooSmall.errno(), libc::ENOSPC);
        let io = Error::from(io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(io.errno(), libc::EACCES);
    }
}

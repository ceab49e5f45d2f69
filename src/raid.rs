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

//! RAID placement: maps a logical data-block index to the physical locations
//! holding its bytes.

use crate::error::Error;

/// The placement policy for file data blocks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RaidMode {
    /// Data blocks are distributed round-robin across disks, one copy each.
    Stripe,
    /// Every data block is copied to every disk.
    Mirror,
    /// As [`RaidMode::Mirror`]; reads may additionally cross-check replicas.
    VerifiedMirror,
}

/// A physical block location: a disk ordinal and a block index local to that
/// disk's data region.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockSite {
    /// The disk ordinal.
    pub disk: usize,
    /// The block index within the disk's data region.
    pub local: u64,
}

impl RaidMode {
    /// Parses the formatter's command line token (`0`, `1` or `1v`).
    pub fn from_token(token: &str) -> Result<Self, Error> {
        match token {
            "0" => Ok(Self::Stripe),
            "1" => Ok(Self::Mirror),
            "1v" => Ok(Self::VerifiedMirror),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Decodes the superblock's `mode` field.
    pub fn from_raw(raw: u32) -> Result<Self, Error> {
        match raw {
            0 => Ok(Self::Stripe),
            1 => Ok(Self::Mirror),
            2 => Ok(Self::VerifiedMirror),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Encodes into the superblock's `mode` field.
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Stripe => 0,
            Self::Mirror => 1,
            Self::VerifiedMirror => 2,
        }
    }

    /// Returns the authoritative location of data block `b`.
    pub fn locate(self, b: i64, num_disks: u32) -> BlockSite {
        let b = b as u64;
        let n = num_disks as u64;
        match self {
            Self::Stripe => BlockSite {
                disk: (b % n) as usize,
                local: b / n,
            },
            Self::Mirror | Self::VerifiedMirror => BlockSite { disk: 0, local: b },
        }
    }

    /// Returns every location a write to data block `b` must touch.
    pub fn replicas(self, b: i64, num_disks: u32) -> Vec<BlockSite> {
        match self {
            Self::Stripe => vec![self.locate(b, num_disks)],
            Self::Mirror | Self::VerifiedMirror => (0..num_disks as usize)
                .map(|disk| BlockSite {
                    disk,
                    local: b as u64,
                })
                .collect(),
        }
    }

    /// Returns the local index at which every disk holds its copy of the
    /// directory page `b`.
    ///
    /// Directory pages are mirrored on every disk regardless of the mode.
    /// Under striping they sit at the stripe slot of their row (the allocator
    /// claims the whole row, see [`crate::alloc::alloc_dir_page`]) so the
    /// replicas cannot collide with striped file data.
    pub fn dir_local(self, b: i64, num_disks: u32) -> u64 {
        match self {
            Self::Stripe => b as u64 / num_disks as u64,
            Self::Mirror | Self::VerifiedMirror => b as u64,
        }
    }

    /// Returns every location holding a copy of the directory page `b`.
    pub fn dir_replicas(self, b: i64, num_disks: u32) -> Vec<BlockSite> {
        let local = self.dir_local(b, num_disks);
        (0..num_disks as usize)
            .map(|disk| BlockSite { disk, local })
            .collect()
    }
}

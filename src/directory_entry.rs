//! Directory entries: fixed-size records mapping a name to an inode index,
//! packed into a directory's data pages.

use crate::MAX_NAME;
use byteorder::{ByteOrder, LittleEndian};

/// One directory entry slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectoryEntry {
    /// The entry name, NUL-terminated.
    name: [u8; MAX_NAME],
    /// The referenced inode index. `0` in any slot but the root's own entry
    /// marks a free slot.
    pub num: i32,
}

impl DirectoryEntry {
    /// The encoded size of one entry.
    pub const SIZE: usize = MAX_NAME + 4;

    /// Builds an entry for `name`, truncated to `MAX_NAME - 1` bytes.
    pub fn new(name: &str, num: i32) -> Self {
        let mut buf = [0u8; MAX_NAME];
        let len = name.len().min(MAX_NAME - 1);
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { name: buf, num }
    }

    /// Returns the entry name, without the NUL padding.
    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(MAX_NAME);
        &self.name[..len]
    }

    /// Tells whether the slot is free.
    pub fn is_free(&self) -> bool {
        self.num <= 0
    }

    /// Decodes an entry from its slot.
    pub fn decode(buf: &[u8]) -> Self {
        let mut name = [0u8; MAX_NAME];
        name.copy_from_slice(&buf[..MAX_NAME]);
        Self {
            name,
            num: LittleEndian::read_i32(&buf[MAX_NAME..Self::SIZE]),
        }
    }

    /// Encodes the entry into its slot.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[..MAX_NAME].copy_from_slice(&self.name);
        LittleEndian::write_i32(&mut buf[MAX_NAME..Self::SIZE], self.num);
    }
}

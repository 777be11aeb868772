//! On-disk header prefix and index table entries
//!
//! # Layout
//! ```text
//! 0x00: tag [u8; 4]        reversed header name ("43DM" for MD34)
//! 0x04: index_offset u32
//! 0x08: index_size u32     number of index entries
//! ...   remaining header fields, then section payloads padded with 0xAA
//! index_offset: index_size * 16-byte entries
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ContainerError;

/// Filler written after each section payload
pub const PAD_BYTE: u8 = 0xAA;

/// Section payloads start on multiples of this
pub const ALIGNMENT: usize = 16;

/// Payload length rounded up to [`ALIGNMENT`]
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(ALIGNMENT) * ALIGNMENT
}

fn tag_name(tag: &[u8; 4]) -> String {
    tag.iter().rev().map(|&b| b as char).collect()
}

/// Leading fields of the header section, read before the dialect is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub tag: [u8; 4],
    pub index_offset: u32,
    pub index_size: u32,
}

impl FileHeader {
    pub const SIZE: usize = 12;

    /// Header structure name spelled by the tag (`"MD34"`)
    pub fn name(&self) -> String {
        tag_name(&self.tag)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.tag);
        LittleEndian::write_u32(&mut bytes[4..8], self.index_offset);
        LittleEndian::write_u32(&mut bytes[8..12], self.index_size);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            tag: [bytes[0], bytes[1], bytes[2], bytes[3]],
            index_offset: LittleEndian::read_u32(&bytes[4..8]),
            index_size: LittleEndian::read_u32(&bytes[8..12]),
        })
    }
}

/// One row of the index table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Structure name, byte-reversed
    pub tag: [u8; 4],
    pub offset: u32,
    pub repetitions: u32,
    pub version: u32,
}

impl IndexEntry {
    pub const SIZE: usize = 16;

    /// On-disk tag for a structure name
    pub fn tag_for(name: &str) -> Result<[u8; 4], ContainerError> {
        let bytes = name.as_bytes();
        match bytes {
            [a, b, c, d] if bytes.iter().all(u8::is_ascii_graphic) => Ok([*d, *c, *b, *a]),
            _ => Err(ContainerError::InvalidTag(name.to_string())),
        }
    }

    /// Whether the tag is made of printable ASCII
    pub fn has_valid_tag(&self) -> bool {
        self.tag.iter().all(|b| b.is_ascii_graphic())
    }

    /// Structure name spelled by the tag
    pub fn name(&self) -> String {
        tag_name(&self.tag)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.tag);
        LittleEndian::write_u32(&mut bytes[4..8], self.offset);
        LittleEndian::write_u32(&mut bytes[8..12], self.repetitions);
        LittleEndian::write_u32(&mut bytes[12..16], self.version);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            tag: [bytes[0], bytes[1], bytes[2], bytes[3]],
            offset: LittleEndian::read_u32(&bytes[4..8]),
            repetitions: LittleEndian::read_u32(&bytes[8..12]),
            version: LittleEndian::read_u32(&bytes[12..16]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_reversed() {
        assert_eq!(&IndexEntry::tag_for("MD34").unwrap(), b"43DM");
        assert_eq!(&IndexEntry::tag_for("U8__").unwrap(), b"__8U");
        assert!(IndexEntry::tag_for("Reference").is_err());
        assert!(IndexEntry::tag_for("AB").is_err());

        let entry = IndexEntry {
            tag: *b"ENOB",
            offset: 0x40,
            repetitions: 3,
            version: 1,
        };
        assert_eq!(entry.name(), "BONE");
        assert!(entry.has_valid_tag());
    }

    #[test]
    fn test_entry_layout() {
        let entry = IndexEntry {
            tag: *b"RAHC",
            offset: 0x20,
            repetitions: 5,
            version: 0,
        };
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[0..4], b"RAHC");
        assert_eq!(&bytes[4..8], &[0x20, 0, 0, 0]);
        assert_eq!(IndexEntry::from_bytes(&bytes), Some(entry));
        assert_eq!(IndexEntry::from_bytes(&bytes[..15]), None);
    }

    #[test]
    fn test_file_header() {
        let header = FileHeader {
            tag: *b"33DM",
            index_offset: 0x100,
            index_size: 4,
        };
        let parsed = FileHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.name(), "MD33");
        assert_eq!(FileHeader::from_bytes(&[0; 8]), None);
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(24), 32);
    }
}

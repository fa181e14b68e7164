// nand/content_map.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements the structures and methods required for parsing and editing /shared1/content.map.

use std::io::{Cursor, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentMapError {
    #[error("content.map is an invalid length ({0} bytes) and cannot be parsed")]
    InvalidLength(usize),
    #[error("found invalid shared content name `{0}`")]
    InvalidSharedContentName(String),
    #[error("content.map has no shared IDs left to assign")]
    SharedIdOverflow,
    #[error("content.map data is not in a valid format")]
    IO(#[from] std::io::Error),
}

/// A shared ID/content hash pairing in a content.map file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMapEntry {
    pub shared_id: u32,
    pub hash: [u8; 20],
}

/// The result of looking up a content hash in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedAssignment {
    pub shared_id: u32,
    /// Whether the hash was just added, meaning the content still has to be written.
    pub newly_assigned: bool,
}

/// The shared content map, which gives every shared content installed to the NAND an
/// incrementing ID keyed by its hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedContentMap {
    entries: Vec<ContentMapEntry>,
}

impl SharedContentMap {
    /// Creates a new SharedContentMap instance from the binary data of a content.map file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ContentMapError> {
        // Each entry is 8 characters of name followed by a 20 byte hash.
        if !data.len().is_multiple_of(28) {
            return Err(ContentMapError::InvalidLength(data.len()));
        }
        let mut buf = Cursor::new(data);
        let mut entries = Vec::with_capacity(data.len() / 28);
        for _ in 0..data.len() / 28 {
            // Names are stored as ASCII hex rather than as a number.
            let mut name = [0u8; 8];
            buf.read_exact(&mut name)?;
            let name = String::from_utf8_lossy(&name);
            let shared_id = u32::from_str_radix(&name, 16)
                .map_err(|_| ContentMapError::InvalidSharedContentName(name.to_string()))?;
            let mut hash = [0u8; 20];
            buf.read_exact(&mut hash)?;
            entries.push(ContentMapEntry { shared_id, hash });
        }
        Ok(SharedContentMap { entries })
    }

    /// Creates a new, empty SharedContentMap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dumps the data in a SharedContentMap back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.entries.len() * 28);
        for entry in &self.entries {
            buf.write_all(format!("{:08x}", entry.shared_id).as_bytes())?;
            buf.write_all(&entry.hash)?;
        }
        Ok(buf)
    }

    pub fn entries(&self) -> &[ContentMapEntry] {
        &self.entries
    }

    /// Gets the shared ID for a content hash, adding the hash with the next free ID if it isn't
    /// already in the map.
    pub fn assign(&mut self, hash: &[u8; 20]) -> Result<SharedAssignment, ContentMapError> {
        if let Some(entry) = self.entries.iter().find(|entry| entry.hash == *hash) {
            return Ok(SharedAssignment { shared_id: entry.shared_id, newly_assigned: false });
        }
        let shared_id = match self.entries.iter().map(|entry| entry.shared_id).max() {
            Some(max) => max.checked_add(1).ok_or(ContentMapError::SharedIdOverflow)?,
            None => 0,
        };
        self.entries.push(ContentMapEntry { shared_id, hash: *hash });
        Ok(SharedAssignment { shared_id, newly_assigned: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_is_idempotent() {
        let mut map = SharedContentMap::new();
        assert_eq!(map.assign(&[1; 20]).unwrap(), SharedAssignment { shared_id: 0, newly_assigned: true });
        assert_eq!(map.assign(&[2; 20]).unwrap(), SharedAssignment { shared_id: 1, newly_assigned: true });
        assert_eq!(map.assign(&[1; 20]).unwrap(), SharedAssignment { shared_id: 0, newly_assigned: false });
        assert_eq!(map.entries().len(), 2);
    }

    #[test]
    fn test_ids_continue_from_max() {
        let mut data = b"0000000a".to_vec();
        data.extend_from_slice(&[7; 20]);
        let mut map = SharedContentMap::from_bytes(&data).unwrap();
        assert_eq!(map.assign(&[8; 20]).unwrap().shared_id, 0xB);
    }

    #[test]
    fn test_dump_format() {
        let mut map = SharedContentMap::new();
        for i in 0..12u8 {
            map.assign(&[i; 20]).unwrap();
        }
        let data = map.to_bytes().unwrap();
        assert_eq!(data.len(), 12 * 28);
        assert_eq!(&data[11 * 28..11 * 28 + 8], b"0000000b");
        assert_eq!(SharedContentMap::from_bytes(&data).unwrap(), map);
    }

    #[test]
    fn test_assign_overflow() {
        let mut data = b"ffffffff".to_vec();
        data.extend_from_slice(&[7; 20]);
        let mut map = SharedContentMap::from_bytes(&data).unwrap();
        assert!(matches!(map.assign(&[8; 20]), Err(ContentMapError::SharedIdOverflow)));
        assert_eq!(map.assign(&[7; 20]).unwrap().shared_id, u32::MAX);
        assert_eq!(map.entries().len(), 1);
    }

    #[test]
    fn test_invalid_data() {
        assert!(matches!(SharedContentMap::from_bytes(&[0; 27]), Err(ContentMapError::InvalidLength(27))));
        let mut data = b"zzzzzzzz".to_vec();
        data.extend_from_slice(&[0; 20]);
        assert!(matches!(SharedContentMap::from_bytes(&data), Err(ContentMapError::InvalidSharedContentName(_))));
    }
}

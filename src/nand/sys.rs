// nand/sys.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements the structures and methods required for parsing and editing /sys/uid.sys, the log of
// every title that has been installed to a NAND.

use std::io::{Cursor, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use thiserror::Error;
use crate::title::tmd::read_array;

#[derive(Debug, Error)]
pub enum UidSysError {
    #[error("uid.sys is an invalid length ({0} bytes) and cannot be parsed")]
    InvalidLength(usize),
    #[error("uid.sys has no UIDs left to assign")]
    UidOverflow,
    #[error("uid.sys data is not in a valid format")]
    IO(#[from] std::io::Error),
}

/// The System Menu is always the first title in uid.sys.
pub const SYSTEM_MENU_TID: [u8; 8] = [0, 0, 0, 1, 0, 0, 0, 2];
/// UIDs are assigned starting from this value.
pub const BASE_UID: u32 = 0x1000;

/// A Title ID/UID pairing in a uid.sys file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSysEntry {
    pub title_id: [u8; 8],
    pub uid: u32,
}

/// A structure that allows for creating, parsing, and editing a /sys/uid.sys file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSys {
    entries: Vec<UidSysEntry>,
}

impl Default for UidSys {
    fn default() -> Self {
        Self::new()
    }
}

impl UidSys {
    /// Creates a new UidSys instance from the binary data of a uid.sys file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, UidSysError> {
        if !data.len().is_multiple_of(12) {
            return Err(UidSysError::InvalidLength(data.len()));
        }
        let mut buf = Cursor::new(data);
        let entries = (0..data.len() / 12)
            .map(|_| -> Result<UidSysEntry, UidSysError> {
                Ok(UidSysEntry { title_id: read_array(&mut buf)?, uid: buf.read_u32::<BigEndian>()? })
            })
            .collect::<Result<Vec<_>, UidSysError>>()?;
        Ok(UidSys { entries })
    }

    /// Creates a new uid.sys holding only the System Menu, with UID 0x1000.
    pub fn new() -> Self {
        UidSys { entries: vec![UidSysEntry { title_id: SYSTEM_MENU_TID, uid: BASE_UID }] }
    }

    /// Dumps the data in a UidSys back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf: Vec<u8> = Vec::with_capacity(self.entries.len() * 12);
        for entry in &self.entries {
            buf.write_all(&entry.title_id)?;
            buf.write_u32::<BigEndian>(entry.uid)?;
        }
        Ok(buf)
    }

    pub fn entries(&self) -> &[UidSysEntry] {
        &self.entries
    }

    /// Gets the UID of a Title ID, if it has ever been registered.
    pub fn uid(&self, title_id: [u8; 8]) -> Option<u32> {
        self.entries.iter().find(|entry| entry.title_id == title_id).map(|entry| entry.uid)
    }

    /// Gets the UID of a Title ID, registering it with the next free UID first if it isn't
    /// already in the file.
    pub fn register(&mut self, title_id: [u8; 8]) -> Result<u32, UidSysError> {
        if let Some(uid) = self.uid(title_id) {
            return Ok(uid);
        }
        let uid = match self.entries.iter().map(|entry| entry.uid).max() {
            Some(max) => max.checked_add(1).ok_or(UidSysError::UidOverflow)?,
            None => BASE_UID,
        };
        debug!("assigning UID {:#X} to {}", uid, hex::encode(title_id));
        self.entries.push(UidSysEntry { title_id, uid });
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TID: [u8; 8] = [0x00, 0x01, 0x00, 0x02, 0x48, 0x41, 0x42, 0x41];

    #[test]
    fn test_new_has_system_menu() {
        let uid_sys = UidSys::new();
        assert_eq!(uid_sys.to_bytes().unwrap(), vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0x10, 0]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut uid_sys = UidSys::new();
        assert_eq!(uid_sys.register(TID).unwrap(), 0x1001);
        assert_eq!(uid_sys.register(TID).unwrap(), 0x1001);
        assert_eq!(uid_sys.register(SYSTEM_MENU_TID).unwrap(), 0x1000);
        assert_eq!(uid_sys.entries().len(), 2);
    }

    #[test]
    fn test_register_increments() {
        let mut uid_sys = UidSys::new();
        let uids: Vec<u32> = (0..5u8).map(|i| uid_sys.register([0, 1, 0, 1, 0, 0, 0, i]).unwrap()).collect();
        assert_eq!(uids, vec![0x1001, 0x1002, 0x1003, 0x1004, 0x1005]);
        let reloaded = UidSys::from_bytes(&uid_sys.to_bytes().unwrap()).unwrap();
        assert_eq!(reloaded, uid_sys);
    }

    #[test]
    fn test_register_overflow() {
        let mut data = SYSTEM_MENU_TID.to_vec();
        data.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut uid_sys = UidSys::from_bytes(&data).unwrap();
        assert!(matches!(uid_sys.register(TID), Err(UidSysError::UidOverflow)));
        assert_eq!(uid_sys.entries().len(), 1);
        assert_eq!(uid_sys.register(SYSTEM_MENU_TID).unwrap(), u32::MAX);
    }

    #[test]
    fn test_invalid_length() {
        assert!(matches!(UidSys::from_bytes(&[0; 13]), Err(UidSysError::InvalidLength(13))));
    }
}

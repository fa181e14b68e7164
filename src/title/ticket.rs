// title/ticket.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements the structures and methods required for Ticket parsing and editing.

use std::io::{Cursor, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use crate::title::commonkeys::CommonKeySlot;
use crate::title::crypto;
use crate::title::signing::{Signable, SIGNED_BODY_OFFSET};
use crate::title::tmd::read_array;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket is version `{0}` but only v0 is supported")]
    UnsupportedVersion(u8),
    #[error("Ticket data is not in a valid format")]
    IO(#[from] std::io::Error),
}

/// Certificate that signs retail Tickets.
pub const RETAIL_ISSUER: &str = "Root-CA00000001-XS00000003";
/// Certificate that signs development Tickets.
pub const DEV_ISSUER: &str = "Root-CA00000002-XS00000006";

/// A structure that represents a Wii Ticket file.
#[derive(Debug, Clone)]
pub struct Ticket {
    signature_type: u32,
    signature: [u8; 256],
    padding1: [u8; 60],
    signature_issuer: [u8; 64],
    ecdh_data: [u8; 60],
    ticket_version: u8,
    reserved1: [u8; 2],
    title_key: [u8; 16],
    // Unknown byte, Ticket ID, and console ID.
    ticket_info: [u8; 13],
    title_id: [u8; 8],
    unknown2: u16, // Fakesigning filler.
    title_version: u16,
    permission_masks: [u8; 8],
    title_export_allowed: u8,
    common_key_index: u8,
    unknown3: [u8; 48],
    content_access_permission: [u8; 64],
    padding2: [u8; 2],
    title_limits: [u8; 64],
}

impl Ticket {
    /// Creates a new Ticket instance from the binary data of a Ticket file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TicketError> {
        let mut buf = Cursor::new(data);
        let signature_type = buf.read_u32::<BigEndian>()?;
        let signature = read_array(&mut buf)?;
        let padding1 = read_array(&mut buf)?;
        let signature_issuer = read_array(&mut buf)?;
        let ecdh_data = read_array(&mut buf)?;
        let ticket_version = buf.read_u8()?;
        // v1 Tickets carry a variable length section after the limits that isn't handled.
        if ticket_version != 0 {
            return Err(TicketError::UnsupportedVersion(ticket_version));
        }
        Ok(Ticket {
            signature_type,
            signature,
            padding1,
            signature_issuer,
            ecdh_data,
            ticket_version,
            reserved1: read_array(&mut buf)?,
            title_key: read_array(&mut buf)?,
            ticket_info: read_array(&mut buf)?,
            title_id: read_array(&mut buf)?,
            unknown2: buf.read_u16::<BigEndian>()?,
            title_version: buf.read_u16::<BigEndian>()?,
            permission_masks: read_array(&mut buf)?,
            title_export_allowed: buf.read_u8()?,
            common_key_index: buf.read_u8()?,
            unknown3: read_array(&mut buf)?,
            content_access_permission: read_array(&mut buf)?,
            padding2: read_array(&mut buf)?,
            title_limits: read_array(&mut buf)?,
        })
    }

    /// Dumps the data in a Ticket instance back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf: Vec<u8> = Vec::with_capacity(0x2A4);
        buf.write_u32::<BigEndian>(self.signature_type)?;
        buf.write_all(&self.signature)?;
        buf.write_all(&self.padding1)?;
        buf.write_all(&self.signature_issuer)?;
        buf.write_all(&self.ecdh_data)?;
        buf.write_u8(self.ticket_version)?;
        buf.write_all(&self.reserved1)?;
        buf.write_all(&self.title_key)?;
        buf.write_all(&self.ticket_info)?;
        buf.write_all(&self.title_id)?;
        buf.write_u16::<BigEndian>(self.unknown2)?;
        buf.write_u16::<BigEndian>(self.title_version)?;
        buf.write_all(&self.permission_masks)?;
        buf.write_u8(self.title_export_allowed)?;
        buf.write_u8(self.common_key_index)?;
        buf.write_all(&self.unknown3)?;
        buf.write_all(&self.content_access_permission)?;
        buf.write_all(&self.padding2)?;
        buf.write_all(&self.title_limits)?;
        Ok(buf)
    }

    /// Gets the raw encrypted Title Key from the Ticket.
    pub fn title_key(&self) -> [u8; 16] {
        self.title_key
    }

    /// Gets the version of the title listed in the Ticket.
    pub fn title_version(&self) -> u16 {
        self.title_version
    }

    pub fn set_title_version(&mut self, version: u16) {
        self.title_version = version;
    }

    /// Gets the index of the common key used by the Ticket.
    pub fn common_key_index(&self) -> u8 {
        self.common_key_index
    }

    /// Gets the decrypted version of the Title Key stored in a Ticket.
    pub fn title_key_dec(&self) -> [u8; 16] {
        crypto::decrypt_title_key(self.title_key, self.common_key_index, self.title_id, self.is_dev())
    }

    /// Encrypts a decrypted Title Key under the given common key slot and stores both the key
    /// and the slot's index in the Ticket. Index 0 means the retail or development key depending
    /// on the issuer, so moving between those two slots also changes the issuer.
    pub fn wrap_title_key(&mut self, title_key_dec: [u8; 16], slot: CommonKeySlot) {
        match slot {
            CommonKeySlot::Retail if self.is_dev() => self.set_signature_issuer(RETAIL_ISSUER),
            CommonKeySlot::Development if !self.is_dev() => self.set_signature_issuer(DEV_ISSUER),
            _ => {}
        }
        self.title_key = crypto::encrypt_title_key_for_slot(title_key_dec, slot, self.title_id);
        self.common_key_index = slot.index();
    }

    /// Gets whether a Ticket was signed for development (true) or retail (false).
    pub fn is_dev(&self) -> bool {
        let issuer = self.signature_issuer();
        issuer.contains("Root-CA00000002-XS00000004") || issuer.contains("Root-CA00000002-XS00000006")
    }

    /// Gets the name of the certificate used to sign a Ticket as a string.
    pub fn signature_issuer(&self) -> String {
        String::from_utf8_lossy(&self.signature_issuer).trim_end_matches('\0').to_owned()
    }

    fn set_signature_issuer(&mut self, issuer: &str) {
        self.signature_issuer = [0; 64];
        self.signature_issuer[..issuer.len()].copy_from_slice(issuer.as_bytes());
    }

    /// Gets the Title ID of the Ticket.
    pub fn title_id(&self) -> [u8; 8] {
        self.title_id
    }

    /// Sets a new Title ID for the Ticket. This will re-encrypt the Title Key, since the Title ID
    /// is used as the IV for decrypting the Title Key.
    pub fn set_title_id(&mut self, title_id: [u8; 8]) {
        let title_key_dec = self.title_key_dec();
        self.title_id = title_id;
        self.title_key = crypto::encrypt_title_key(title_key_dec, self.common_key_index, title_id, self.is_dev());
    }
}

impl Signable for Ticket {
    fn signature(&self) -> [u8; 256] {
        self.signature
    }

    fn set_signature(&mut self, signature: [u8; 256]) {
        self.signature = signature;
    }

    fn signed_body(&self) -> Result<Vec<u8>, std::io::Error> {
        Ok(self.to_bytes()?.split_off(SIGNED_BODY_OFFSET))
    }

    fn set_filler(&mut self, value: u16) {
        self.unknown2 = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::fixtures;
    use crate::title::signing::{is_fakesigned, Fakesigner, Signer};

    const TID: [u8; 8] = [0, 0, 0, 1, 0, 0, 0, 0x38];

    #[test]
    fn test_parse_and_dump() {
        let data = fixtures::ticket_bytes(TID, [0x11; 16], 1);
        let ticket = Ticket::from_bytes(&data).unwrap();
        assert_eq!(ticket.title_id(), TID);
        assert_eq!(ticket.common_key_index(), 1);
        assert_eq!(ticket.title_key_dec(), [0x11; 16]);
        assert!(!ticket.is_dev());
        assert_eq!(ticket.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = fixtures::ticket_bytes(TID, [0x11; 16], 0);
        data[0x1BC] = 1;
        assert!(matches!(Ticket::from_bytes(&data), Err(TicketError::UnsupportedVersion(1))));
    }

    #[test]
    fn test_set_title_id_keeps_key() {
        let mut ticket = Ticket::from_bytes(&fixtures::ticket_bytes(TID, [0x22; 16], 0)).unwrap();
        let old_enc = ticket.title_key();
        ticket.set_title_id([0, 0, 0, 1, 0, 0, 0, 0xF9]);
        assert_ne!(ticket.title_key(), old_enc);
        assert_eq!(ticket.title_key_dec(), [0x22; 16]);
    }

    #[test]
    fn test_wrap_title_key_moves_to_retail() {
        let mut ticket = Ticket::from_bytes(&fixtures::ticket_bytes(TID, [0x33; 16], 1)).unwrap();
        ticket.wrap_title_key(ticket.title_key_dec(), CommonKeySlot::Retail);
        assert_eq!(ticket.common_key_index(), 0);
        assert_eq!(ticket.title_key_dec(), [0x33; 16]);
    }

    #[test]
    fn test_wrap_title_key_leaves_development() {
        let data = fixtures::issued_ticket_bytes(TID, [0x55; 16], 0, DEV_ISSUER);
        let mut ticket = Ticket::from_bytes(&data).unwrap();
        assert!(ticket.is_dev());
        assert_eq!(ticket.title_key_dec(), [0x55; 16]);
        ticket.wrap_title_key(ticket.title_key_dec(), CommonKeySlot::Retail);
        assert!(!ticket.is_dev());
        assert_eq!(ticket.signature_issuer(), RETAIL_ISSUER);
        assert_eq!(ticket.title_key(), crypto::encrypt_title_key([0x55; 16], 0, TID, false));
        let reloaded = Ticket::from_bytes(&ticket.to_bytes().unwrap()).unwrap();
        assert_eq!(reloaded.title_key_dec(), [0x55; 16]);
        ticket.wrap_title_key([0x55; 16], CommonKeySlot::Development);
        assert!(ticket.is_dev());
        assert_eq!(ticket.title_key_dec(), [0x55; 16]);
    }

    #[test]
    fn test_fakesign_ticket() {
        let mut ticket = Ticket::from_bytes(&fixtures::ticket_bytes(TID, [0x44; 16], 0)).unwrap();
        Fakesigner.sign(&mut ticket).unwrap();
        assert!(is_fakesigned(&ticket));
        assert!(is_fakesigned(&Ticket::from_bytes(&ticket.to_bytes().unwrap()).unwrap()));
    }
}

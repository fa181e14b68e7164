// title/mod.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Root for all title-related modules and implementation of the high-level Title object.

pub mod cios;
pub mod ciosmap;
pub mod commonkeys;
pub mod content;
pub mod crypto;
pub mod iospatcher;
pub mod patch;
pub mod signing;
pub mod ticket;
pub mod tmd;
pub mod wad;

use thiserror::Error;
use crate::title::signing::{Fakesigner, Signer};

#[derive(Debug, Error)]
pub enum TitleError {
    #[error("TMD processing error")]
    TMD(#[from] tmd::TMDError),
    #[error("Ticket processing error")]
    Ticket(#[from] ticket::TicketError),
    #[error("content processing error")]
    Content(#[from] content::ContentError),
    #[error("WAD processing error")]
    WAD(#[from] wad::WADError),
    #[error("signing error")]
    Signing(#[from] signing::SigningError),
    #[error("title data could not be serialized")]
    IO(#[from] std::io::Error),
}

/// A structure that represents the components of a digital Wii title.
#[derive(Debug, Clone)]
pub struct Title {
    cert_chain: Vec<u8>,
    crl: Vec<u8>,
    pub ticket: ticket::Ticket,
    pub tmd: tmd::TMD,
    pub content: content::ContentRegion,
    meta: Vec<u8>,
}

impl Title {
    /// Creates a new Title instance from an existing WAD instance.
    pub fn from_wad(wad: &wad::WAD) -> Result<Title, TitleError> {
        let ticket = ticket::Ticket::from_bytes(wad.ticket())?;
        let tmd = tmd::TMD::from_bytes(wad.tmd())?;
        let content = content::ContentRegion::from_bytes(wad.content(), tmd.content_records().clone())?;
        Ok(Title {
            cert_chain: wad.cert_chain().to_vec(),
            crl: wad.crl().to_vec(),
            ticket,
            tmd,
            content,
            meta: wad.meta().to_vec(),
        })
    }

    /// Creates a new Title instance from all of its individual components.
    pub fn from_parts(cert_chain: &[u8], crl: Option<&[u8]>, ticket: ticket::Ticket, tmd: tmd::TMD,
                      content: content::ContentRegion, meta: Option<&[u8]>) -> Title {
        Title {
            cert_chain: cert_chain.to_vec(),
            crl: crl.map(|crl| crl.to_vec()).unwrap_or_default(),
            ticket,
            tmd,
            content,
            meta: meta.map(|meta| meta.to_vec()).unwrap_or_default(),
        }
    }

    /// Creates a new Title instance from the binary data of a WAD file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Title, TitleError> {
        Title::from_wad(&wad::WAD::from_bytes(bytes)?)
    }

    /// Converts a Title instance into a WAD, which can be used to export the Title back to a file.
    pub fn to_wad(&self) -> Result<wad::WAD, TitleError> {
        Ok(wad::WAD::from_parts(
            &self.cert_chain,
            &self.crl,
            &self.ticket.to_bytes()?,
            &self.tmd.to_bytes()?,
            &self.content.to_bytes()?,
            &self.meta,
            self.tmd.title_id(),
        ))
    }

    /// Dumps the Title into the binary data of a WAD file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TitleError> {
        Ok(self.to_wad()?.to_bytes()?)
    }

    /// Gets the Title ID of the Title, as listed in its TMD.
    pub fn title_id(&self) -> [u8; 8] {
        self.tmd.title_id()
    }

    /// Gets whether the TMD and Ticket of a Title are both fakesigned.
    pub fn is_fakesigned(&self) -> bool {
        signing::is_fakesigned(&self.tmd) && signing::is_fakesigned(&self.ticket)
    }

    /// Signs the TMD and Ticket of a Title with the provided signer.
    pub fn resign<S: Signer>(&mut self, signer: &S) -> Result<(), TitleError> {
        signer.sign(&mut self.tmd)?;
        signer.sign(&mut self.ticket)?;
        Ok(())
    }

    /// Fakesigns the TMD and Ticket of a Title.
    pub fn fakesign(&mut self) -> Result<(), TitleError> {
        self.resign(&Fakesigner)
    }

    /// Gets the decrypted content file from the Title at the specified position, optionally
    /// checking it against the hash in its record.
    pub fn get_content_by_index(&self, index: usize, verify: bool) -> Result<Vec<u8>, content::ContentError> {
        self.content.get_content_by_index(index, self.ticket.title_key_dec(), verify)
    }

    /// Gets the decrypted content file from the Title with the specified Content ID.
    pub fn get_content_by_cid(&self, cid: u32, verify: bool) -> Result<Vec<u8>, content::ContentError> {
        self.content.get_content_by_cid(cid, self.ticket.title_key_dec(), verify)
    }

    /// Replaces the whole content region, and updates the TMD's records to match.
    pub fn set_content_region(&mut self, content: content::ContentRegion) {
        self.tmd.set_content_records(content.content_records());
        self.content = content;
    }

    /// Sets a new Title ID for the Title. This will re-encrypt the Title Key in the Ticket, since
    /// the Title ID is used as the IV for decrypting the Title Key.
    pub fn set_title_id(&mut self, title_id: [u8; 8]) {
        self.tmd.set_title_id(title_id);
        self.ticket.set_title_id(title_id);
    }

    /// Sets the version of the Title in both the TMD and the Ticket.
    pub fn set_title_version(&mut self, version: u16) {
        self.tmd.set_title_version(version);
        self.ticket.set_title_version(version);
    }

    pub fn cert_chain(&self) -> &[u8] {
        &self.cert_chain
    }

    pub fn crl(&self) -> &[u8] {
        &self.crl
    }

    pub fn meta(&self) -> &[u8] {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: &[u8]) {
        self.meta = meta.to_vec();
    }
}

/// Converts bytes to the Wii's storage unit, blocks.
pub fn bytes_to_blocks(size_bytes: u64) -> u64 {
    size_bytes.div_ceil(131072)
}

/// Builders for synthetic titles used across the test suite.
#[cfg(test)]
pub(crate) mod fixtures {
    use byteorder::{BigEndian, WriteBytesExt};
    use crate::title::content::{ContentStaging, StagedContent};
    use crate::title::crypto;
    use crate::title::ticket::{self, Ticket};
    use crate::title::tmd::{ContentRecord, ContentType, TMD};
    use crate::title::Title;

    pub const TITLE_KEY: [u8; 16] = [0x3C, 0x17, 0x8E, 0x01, 0x99, 0x4B, 0x20, 0xD2, 0x6F, 0x55, 0xA0, 0x0B, 0x71, 0xE4, 0x28, 0x9D];

    pub fn record(content_id: u32, index: u16, content_type: ContentType) -> ContentRecord {
        ContentRecord { content_id, index, content_type, content_size: 0, content_hash: [0; 20] }
    }

    fn padded(text: &str, len: usize) -> Vec<u8> {
        let mut out = text.as_bytes().to_vec();
        out.resize(len, 0);
        out
    }

    pub fn tmd_bytes(title_id: [u8; 8], version: u16, records: &[ContentRecord]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(0x10001).unwrap();
        buf.extend_from_slice(&[0xAB; 256]);
        buf.extend_from_slice(&[0; 60]);
        buf.extend(padded("Root-CA00000001-CP00000004", 64));
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0x38]);
        buf.extend_from_slice(&title_id);
        let mut title_info = [0u8; 72];
        title_info[9] = 1;
        buf.extend_from_slice(&title_info);
        buf.write_u16::<BigEndian>(version).unwrap();
        buf.write_u16::<BigEndian>(records.len() as u16).unwrap();
        buf.write_u16::<BigEndian>(0).unwrap();
        buf.write_u16::<BigEndian>(0).unwrap();
        for record in records {
            buf.write_u32::<BigEndian>(record.content_id).unwrap();
            buf.write_u16::<BigEndian>(record.index).unwrap();
            buf.write_u16::<BigEndian>(record.content_type.into()).unwrap();
            buf.write_u64::<BigEndian>(record.content_size).unwrap();
            buf.extend_from_slice(&record.content_hash);
        }
        buf
    }

    pub fn ticket_bytes(title_id: [u8; 8], title_key: [u8; 16], common_key_index: u8) -> Vec<u8> {
        issued_ticket_bytes(title_id, title_key, common_key_index, ticket::RETAIL_ISSUER)
    }

    pub fn issued_ticket_bytes(title_id: [u8; 8], title_key: [u8; 16], common_key_index: u8, issuer: &str) -> Vec<u8> {
        let is_dev = issuer == ticket::DEV_ISSUER;
        let mut buf = vec![0u8; 0x2A4];
        buf[0..4].copy_from_slice(&0x10001u32.to_be_bytes());
        buf[4..0x104].fill(0xCD);
        buf[0x140..0x180].copy_from_slice(&padded(issuer, 64));
        buf[0x1BF..0x1CF].copy_from_slice(&crypto::encrypt_title_key(title_key, common_key_index, title_id, is_dev));
        buf[0x1DC..0x1E4].copy_from_slice(&title_id);
        buf[0x1F1] = common_key_index;
        buf
    }

    /// Builds a complete Title whose contents take their index from their position.
    pub fn title(title_id: [u8; 8], version: u16, contents: &[(u32, ContentType, &[u8])]) -> Title {
        title_with_key_index(title_id, version, contents, 0)
    }

    pub fn title_with_key_index(title_id: [u8; 8], version: u16, contents: &[(u32, ContentType, &[u8])],
                                common_key_index: u8) -> Title {
        title_with_ticket(title_id, version, contents, &ticket_bytes(title_id, TITLE_KEY, common_key_index))
    }

    /// Builds a complete Title around prebuilt Ticket data, which must wrap [`TITLE_KEY`].
    pub fn title_with_ticket(title_id: [u8; 8], version: u16, contents: &[(u32, ContentType, &[u8])],
                             ticket_data: &[u8]) -> Title {
        let ticket = Ticket::from_bytes(ticket_data).unwrap();
        let mut staging = ContentStaging::default();
        for (content_id, content_type, data) in contents {
            staging.push(StagedContent { content_id: *content_id, content_type: *content_type, data: data.to_vec() });
        }
        let content = staging.into_region(TITLE_KEY).unwrap();
        let mut tmd = TMD::from_bytes(&tmd_bytes(title_id, version, &[])).unwrap();
        tmd.set_content_records(content.content_records());
        Title::from_parts(&[0xCE; 0x40], None, ticket, tmd, content, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::tmd::ContentType;

    const TID: [u8; 8] = [0, 1, 0, 1, 0x48, 0x41, 0x43, 0x41];

    #[test]
    fn test_wad_round_trip() {
        let mut title = fixtures::title(TID, 3, &[(0, ContentType::Normal, b"banner"), (1, ContentType::Shared, b"shared")]);
        title.set_meta(b"footer");
        let parsed = Title::from_bytes(&title.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.title_id(), TID);
        assert_eq!(parsed.tmd.num_contents(), 2);
        assert_eq!(parsed.get_content_by_index(0, true).unwrap(), b"banner");
        assert_eq!(parsed.get_content_by_cid(1, true).unwrap(), b"shared");
        assert_eq!(parsed.meta(), b"footer");
        assert_eq!(parsed.cert_chain(), &[0xCE; 0x40]);
    }

    #[test]
    fn test_fakesign_title() {
        let mut title = fixtures::title(TID, 3, &[(0, ContentType::Normal, b"banner")]);
        assert!(!title.is_fakesigned());
        title.fakesign().unwrap();
        assert!(title.is_fakesigned());
        assert!(Title::from_bytes(&title.to_bytes().unwrap()).unwrap().is_fakesigned());
    }

    #[test]
    fn test_set_title_id_and_version() {
        let mut title = fixtures::title(TID, 3, &[(0, ContentType::Normal, b"banner")]);
        title.set_title_id([0, 1, 0, 1, 0x48, 0x41, 0x43, 0x42]);
        title.set_title_version(9);
        assert_eq!(title.ticket.title_id(), [0, 1, 0, 1, 0x48, 0x41, 0x43, 0x42]);
        assert_eq!(title.tmd.title_version(), 9);
        assert_eq!(title.ticket.title_version(), 9);
        assert_eq!(title.get_content_by_index(0, true).unwrap(), b"banner");
    }

    #[test]
    fn test_bytes_to_blocks() {
        assert_eq!(bytes_to_blocks(0), 0);
        assert_eq!(bytes_to_blocks(1), 1);
        assert_eq!(bytes_to_blocks(131072), 1);
        assert_eq!(bytes_to_blocks(131073), 2);
    }
}

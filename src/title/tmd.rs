// title/tmd.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements the structures and methods required for TMD parsing and editing.

use std::fmt;
use std::io::{Cursor, Read, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use crate::title::signing::{Signable, SIGNED_BODY_OFFSET};

#[derive(Debug, Error)]
pub enum TMDError {
    #[error("TMD data contains content record with invalid type `{0}`")]
    InvalidContentType(u16),
    #[error("TMD declares {declared} contents, which does not match the records present")]
    ContentCountMismatch { declared: u16 },
    #[error("TMD data is not in a valid format")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Normal,
    Development,
    HashTree,
    DLC,
    Shared,
}

impl TryFrom<u16> for ContentType {
    type Error = TMDError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ContentType::Normal),
            2 => Ok(ContentType::Development),
            3 => Ok(ContentType::HashTree),
            0x4001 => Ok(ContentType::DLC),
            0x8001 => Ok(ContentType::Shared),
            _ => Err(TMDError::InvalidContentType(value)),
        }
    }
}

impl From<ContentType> for u16 {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Normal => 1,
            ContentType::Development => 2,
            ContentType::HashTree => 3,
            ContentType::DLC => 0x4001,
            ContentType::Shared => 0x8001,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContentType::Normal => write!(f, "Normal"),
            ContentType::Development => write!(f, "Development/Unknown"),
            ContentType::HashTree => write!(f, "Hash Tree"),
            ContentType::DLC => write!(f, "DLC"),
            ContentType::Shared => write!(f, "Shared"),
        }
    }
}

/// A structure that represents the metadata of a content file in a digital Wii title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub content_id: u32,
    pub index: u16,
    pub content_type: ContentType,
    pub content_size: u64,
    pub content_hash: [u8; 20],
}

impl ContentRecord {
    fn read(buf: &mut Cursor<&[u8]>) -> Result<Self, TMDError> {
        let content_id = buf.read_u32::<BigEndian>()?;
        let index = buf.read_u16::<BigEndian>()?;
        let content_type = ContentType::try_from(buf.read_u16::<BigEndian>()?)?;
        let content_size = buf.read_u64::<BigEndian>()?;
        let content_hash = read_array(buf)?;
        Ok(ContentRecord { content_id, index, content_type, content_size, content_hash })
    }

    fn write(&self, buf: &mut Vec<u8>) -> Result<(), std::io::Error> {
        buf.write_u32::<BigEndian>(self.content_id)?;
        buf.write_u16::<BigEndian>(self.index)?;
        buf.write_u16::<BigEndian>(self.content_type.into())?;
        buf.write_u64::<BigEndian>(self.content_size)?;
        buf.write_all(&self.content_hash)
    }
}

pub(crate) fn read_array<const N: usize>(buf: &mut Cursor<&[u8]>) -> Result<[u8; N], std::io::Error> {
    let mut out = [0u8; N];
    buf.read_exact(&mut out)?;
    Ok(out)
}

/// A structure that represents a Wii TMD (Title Metadata) file.
#[derive(Debug, Clone)]
pub struct TMD {
    signature_type: u32,
    signature: [u8; 256],
    padding1: [u8; 60],
    signature_issuer: [u8; 64],
    tmd_version: u8,
    ca_crl_version: u8,
    signer_crl_version: u8,
    is_vwii: u8,
    ios_tid: [u8; 8],
    title_id: [u8; 8],
    // Title type, group ID, region, ratings, IPC mask, and access rights. None of these are
    // touched by wadsmith, so they're carried through as-is.
    title_info: [u8; 72],
    title_version: u16,
    boot_index: u16,
    minor_version: u16, // Normally unused, which makes it the fakesigning filler.
    content_records: Vec<ContentRecord>,
}

impl TMD {
    /// Creates a new TMD instance from the binary data of a TMD file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TMDError> {
        let mut buf = Cursor::new(data);
        let signature_type = buf.read_u32::<BigEndian>()?;
        let signature = read_array(&mut buf)?;
        let padding1 = read_array(&mut buf)?;
        let signature_issuer = read_array(&mut buf)?;
        let tmd_version = buf.read_u8()?;
        let ca_crl_version = buf.read_u8()?;
        let signer_crl_version = buf.read_u8()?;
        let is_vwii = buf.read_u8()?;
        let ios_tid = read_array(&mut buf)?;
        let title_id = read_array(&mut buf)?;
        let title_info = read_array(&mut buf)?;
        let title_version = buf.read_u16::<BigEndian>()?;
        let num_contents = buf.read_u16::<BigEndian>()?;
        let boot_index = buf.read_u16::<BigEndian>()?;
        let minor_version = buf.read_u16::<BigEndian>()?;
        let content_records = (0..num_contents)
            .map(|_| ContentRecord::read(&mut buf))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| match err {
                TMDError::IO(_) => TMDError::ContentCountMismatch { declared: num_contents },
                other => other,
            })?;
        Ok(TMD {
            signature_type,
            signature,
            padding1,
            signature_issuer,
            tmd_version,
            ca_crl_version,
            signer_crl_version,
            is_vwii,
            ios_tid,
            title_id,
            title_info,
            title_version,
            boot_index,
            minor_version,
            content_records,
        })
    }

    /// Dumps the data in a TMD back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf: Vec<u8> = Vec::with_capacity(0x1E4 + self.content_records.len() * 36);
        buf.write_u32::<BigEndian>(self.signature_type)?;
        buf.write_all(&self.signature)?;
        buf.write_all(&self.padding1)?;
        buf.write_all(&self.signature_issuer)?;
        buf.write_all(&[self.tmd_version, self.ca_crl_version, self.signer_crl_version, self.is_vwii])?;
        buf.write_all(&self.ios_tid)?;
        buf.write_all(&self.title_id)?;
        buf.write_all(&self.title_info)?;
        buf.write_u16::<BigEndian>(self.title_version)?;
        buf.write_u16::<BigEndian>(self.content_records.len() as u16)?;
        buf.write_u16::<BigEndian>(self.boot_index)?;
        buf.write_u16::<BigEndian>(self.minor_version)?;
        for record in &self.content_records {
            record.write(&mut buf)?;
        }
        Ok(buf)
    }

    /// Gets the version of title listed in the TMD.
    pub fn title_version(&self) -> u16 {
        self.title_version
    }

    pub fn set_title_version(&mut self, version: u16) {
        self.title_version = version;
    }

    /// Gets the number of contents listed in the TMD.
    pub fn num_contents(&self) -> u16 {
        self.content_records.len() as u16
    }

    /// Gets a reference to the content records from the TMD.
    pub fn content_records(&self) -> &Vec<ContentRecord> {
        &self.content_records
    }

    /// Sets the content records in the TMD.
    pub fn set_content_records(&mut self, content_records: &[ContentRecord]) {
        self.content_records = content_records.to_vec();
    }

    /// Gets whether a TMD describes a vWii title.
    pub fn is_vwii(&self) -> bool {
        self.is_vwii == 1
    }

    /// Gets the Title ID of a TMD.
    pub fn title_id(&self) -> [u8; 8] {
        self.title_id
    }

    /// Sets a new Title ID for a TMD.
    pub fn set_title_id(&mut self, title_id: [u8; 8]) {
        self.title_id = title_id;
    }

    /// Gets the Title ID of the IOS required by a TMD.
    pub fn ios_tid(&self) -> [u8; 8] {
        self.ios_tid
    }
}

impl Signable for TMD {
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
        self.minor_version = value;
    }
}

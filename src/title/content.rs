// title/content.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements content parsing and editing, plus the ordered staging area used to rebuild a title's
// content list.

use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use log::debug;
use sha1::{Digest, Sha1};
use thiserror::Error;
use crate::title::crypto;
use crate::title::tmd::{ContentRecord, ContentType};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("requested index {index} is out of range (there are {count} contents)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("content with requested Content ID {0:08X} could not be found")]
    CIDNotFound(u32),
    #[error("the specified Content ID {0:08X} already exists in the content records")]
    CIDAlreadyExists(u32),
    #[error("content's hash did not match the expected value (was {hash}, expected {expected})")]
    BadHash { hash: String, expected: String },
    #[error("content data is not in a valid format")]
    IO(#[from] std::io::Error),
}

fn sha1_digest(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

/// A structure that represents the block of data containing the content of a digital Wii title.
/// Contents are stored encrypted, in the order of their records.
#[derive(Debug, Clone)]
pub struct ContentRegion {
    content_records: Vec<ContentRecord>,
    contents: Vec<Vec<u8>>,
}

impl ContentRegion {
    /// Creates a ContentRegion instance from the content area of a WAD and the ContentRecords
    /// from a TMD. Each content starts on a 64-byte boundary.
    pub fn from_bytes(data: &[u8], content_records: Vec<ContentRecord>) -> Result<Self, ContentError> {
        let mut buf = Cursor::new(data);
        let mut contents: Vec<Vec<u8>> = Vec::with_capacity(content_records.len());
        let mut offset: u64 = 0;
        for record in &content_records {
            buf.seek(SeekFrom::Start(offset))?;
            let mut content = vec![0u8; ((record.content_size + 15) & !15) as usize];
            buf.read_exact(&mut content)?;
            contents.push(content);
            offset += (record.content_size + 63) & !63;
        }
        Ok(ContentRegion { content_records, contents })
    }

    /// Dumps the entire ContentRegion back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut buf: Vec<u8> = Vec::new();
        for content in &self.contents {
            buf.write_all(content)?;
            buf.resize((buf.len() + 63) & !63, 0);
        }
        Ok(buf)
    }

    /// Gets the content records in the ContentRegion.
    pub fn content_records(&self) -> &Vec<ContentRecord> {
        &self.content_records
    }

    /// Gets the position of content in the ContentRegion using its Content ID.
    pub fn get_index_from_cid(&self, cid: u32) -> Result<usize, ContentError> {
        self.content_records.iter()
            .position(|record| record.content_id == cid)
            .ok_or(ContentError::CIDNotFound(cid))
    }

    /// Gets the encrypted content file from the ContentRegion at the specified position.
    pub fn get_enc_content_by_index(&self, index: usize) -> Result<&[u8], ContentError> {
        self.contents.get(index)
            .map(|content| content.as_slice())
            .ok_or(ContentError::IndexOutOfRange { index, count: self.contents.len() })
    }

    /// Gets the decrypted content file from the ContentRegion at the specified position. When
    /// `verify` is set, the SHA-1 of the decrypted data must match the hash in its record.
    pub fn get_content_by_index(&self, index: usize, title_key: [u8; 16], verify: bool) -> Result<Vec<u8>, ContentError> {
        let content = self.get_enc_content_by_index(index)?;
        let record = &self.content_records[index];
        let mut content_dec = crypto::decrypt_content(content, title_key, record.index);
        content_dec.truncate(record.content_size as usize);
        if verify {
            let hash = sha1_digest(&content_dec);
            if hash != record.content_hash {
                return Err(ContentError::BadHash { hash: hex::encode(hash), expected: hex::encode(record.content_hash) });
            }
        }
        Ok(content_dec)
    }

    /// Gets the decrypted content file from the ContentRegion with the specified Content ID.
    pub fn get_content_by_cid(&self, cid: u32, title_key: [u8; 16], verify: bool) -> Result<Vec<u8>, ContentError> {
        self.get_content_by_index(self.get_index_from_cid(cid)?, title_key, verify)
    }
}

/// A decrypted content waiting to be committed back into a ContentRegion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedContent {
    pub content_id: u32,
    pub content_type: ContentType,
    pub data: Vec<u8>,
}

/// An ordered list of decrypted contents. Positions are only turned back into content indices by
/// [`ContentStaging::into_region`], so contents can be moved around freely while staged.
#[derive(Debug, Clone, Default)]
pub struct ContentStaging {
    entries: Vec<StagedContent>,
}

impl ContentStaging {
    /// Decrypts every content in a ContentRegion into a new staging area, keeping record order.
    pub fn from_region(region: &ContentRegion, title_key: [u8; 16], verify: bool) -> Result<Self, ContentError> {
        let entries = region.content_records().iter().enumerate()
            .map(|(i, record)| -> Result<StagedContent, ContentError> {
                Ok(StagedContent {
                    content_id: record.content_id,
                    content_type: record.content_type,
                    data: region.get_content_by_index(i, title_key, verify)?,
                })
            })
            .collect::<Result<Vec<_>, ContentError>>()?;
        Ok(ContentStaging { entries })
    }

    pub fn entries(&self) -> &[StagedContent] {
        &self.entries
    }

    /// Gets the position of the staged content with the specified Content ID.
    pub fn position_of_cid(&self, cid: u32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.content_id == cid)
    }

    /// Replaces the data and type of the content at a position, keeping its Content ID.
    pub fn replace(&mut self, position: usize, data: Vec<u8>, content_type: ContentType) -> Result<(), ContentError> {
        let count = self.entries.len();
        let entry = self.entries.get_mut(position)
            .ok_or(ContentError::IndexOutOfRange { index: position, count })?;
        entry.data = data;
        entry.content_type = content_type;
        Ok(())
    }

    /// Changes the type of the content at a position without touching its data.
    pub fn set_content_type(&mut self, position: usize, content_type: ContentType) -> Result<(), ContentError> {
        let count = self.entries.len();
        let entry = self.entries.get_mut(position)
            .ok_or(ContentError::IndexOutOfRange { index: position, count })?;
        entry.content_type = content_type;
        Ok(())
    }

    /// Appends a content to the end of the staging area.
    pub fn push(&mut self, entry: StagedContent) {
        self.entries.push(entry);
    }

    /// Puts a content at a fixed position. Whatever occupied that position is moved to the end,
    /// keeping its own Content ID and type.
    pub fn insert_and_displace(&mut self, position: usize, entry: StagedContent) -> Result<(), ContentError> {
        let count = self.entries.len();
        let slot = self.entries.get_mut(position)
            .ok_or(ContentError::IndexOutOfRange { index: position, count })?;
        let displaced = std::mem::replace(slot, entry);
        debug!("displacing content {:08X} from position {} to {}", displaced.content_id, position, count);
        self.entries.push(displaced);
        Ok(())
    }

    /// Commits the staged contents into a new ContentRegion. Each content's index becomes its
    /// position, and every content is hashed and encrypted again with the Title Key.
    pub fn into_region(self, title_key: [u8; 16]) -> Result<ContentRegion, ContentError> {
        let mut seen: HashSet<u32> = HashSet::new();
        let mut content_records = Vec::with_capacity(self.entries.len());
        let mut contents = Vec::with_capacity(self.entries.len());
        for (position, entry) in self.entries.into_iter().enumerate() {
            if !seen.insert(entry.content_id) {
                return Err(ContentError::CIDAlreadyExists(entry.content_id));
            }
            let index = u16::try_from(position)
                .map_err(|_| ContentError::IndexOutOfRange { index: position, count: u16::MAX as usize })?;
            let content_size = entry.data.len() as u64;
            contents.push(crypto::encrypt_content(&entry.data, title_key, index, content_size));
            content_records.push(ContentRecord {
                content_id: entry.content_id,
                index,
                content_type: entry.content_type,
                content_size,
                content_hash: sha1_digest(&entry.data),
            });
        }
        Ok(ContentRegion { content_records, contents })
    }
}

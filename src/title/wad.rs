// title/wad.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements the structures and methods required for WAD parsing and editing.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WADError {
    #[error("WAD is invalid type `{0}`")]
    BadType(String),
    #[error("WAD data is not in a valid format")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WADType {
    Installable,
    ImportBoot,
}

impl WADType {
    fn magic(&self) -> &'static [u8; 2] {
        match self {
            WADType::Installable => b"Is",
            WADType::ImportBoot => b"ib",
        }
    }
}

fn align64(offset: u64) -> u64 {
    (offset + 63) & !63
}

/// A structure that represents an entire WAD file. Every section is kept as raw bytes; the
/// header is rebuilt from the section lengths when the WAD is dumped.
#[derive(Debug, Clone)]
pub struct WAD {
    wad_type: WADType,
    wad_version: u16,
    cert_chain: Vec<u8>,
    crl: Vec<u8>,
    ticket: Vec<u8>,
    tmd: Vec<u8>,
    content: Vec<u8>,
    meta: Vec<u8>,
}

impl WAD {
    /// Creates a new WAD instance from the binary data of a WAD file.
    pub fn from_bytes(data: &[u8]) -> Result<WAD, WADError> {
        let mut buf = Cursor::new(data);
        let header_size = buf.read_u32::<BigEndian>()?;
        let mut magic = [0u8; 2];
        buf.read_exact(&mut magic)?;
        let wad_type = match &magic {
            b"Is" => WADType::Installable,
            b"ib" => WADType::ImportBoot,
            _ => return Err(WADError::BadType(String::from_utf8_lossy(&magic).into_owned())),
        };
        let wad_version = buf.read_u16::<BigEndian>()?;
        let mut sizes = [0u32; 6];
        for size in sizes.iter_mut() {
            *size = buf.read_u32::<BigEndian>()?;
        }
        // Content is always stored padded out to the AES block size.
        sizes[4] = (sizes[4] + 15) & !15;
        let mut offset = align64(header_size as u64);
        let mut sections: Vec<Vec<u8>> = Vec::with_capacity(6);
        for size in sizes {
            buf.seek(SeekFrom::Start(offset))?;
            let mut section = vec![0u8; size as usize];
            buf.read_exact(&mut section)?;
            sections.push(section);
            offset = align64(offset + size as u64);
        }
        let mut sections = sections.into_iter();
        let mut next = || sections.next().unwrap_or_default();
        Ok(WAD {
            wad_type,
            wad_version,
            cert_chain: next(),
            crl: next(),
            ticket: next(),
            tmd: next(),
            content: next(),
            meta: next(),
        })
    }

    /// Creates a new WAD instance from the dumped components of a title. Boot2 (Title ID
    /// 0000000100000001) gets the ImportBoot type, everything else is Installable.
    pub fn from_parts(cert_chain: &[u8], crl: &[u8], ticket: &[u8], tmd: &[u8], content: &[u8], meta: &[u8],
                      title_id: [u8; 8]) -> WAD {
        let wad_type = if title_id == [0, 0, 0, 1, 0, 0, 0, 1] {
            WADType::ImportBoot
        } else {
            WADType::Installable
        };
        WAD {
            wad_type,
            wad_version: 0,
            cert_chain: cert_chain.to_vec(),
            crl: crl.to_vec(),
            ticket: ticket.to_vec(),
            tmd: tmd.to_vec(),
            content: content.to_vec(),
            meta: meta.to_vec(),
        }
    }

    /// Dumps the data in a WAD instance back into binary data that can be written to a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WADError> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(32)?;
        buf.write_all(self.wad_type.magic())?;
        buf.write_u16::<BigEndian>(self.wad_version)?;
        let sections = [&self.cert_chain, &self.crl, &self.ticket, &self.tmd, &self.content, &self.meta];
        for section in sections {
            buf.write_u32::<BigEndian>(section.len() as u32)?;
        }
        // Every section, including the header, is padded out to a multiple of 64 bytes.
        for section in sections {
            buf.resize(align64(buf.len() as u64) as usize, 0);
            buf.write_all(section)?;
        }
        buf.resize(align64(buf.len() as u64) as usize, 0);
        Ok(buf)
    }

    pub fn cert_chain(&self) -> &[u8] {
        &self.cert_chain
    }

    pub fn crl(&self) -> &[u8] {
        &self.crl
    }

    pub fn ticket(&self) -> &[u8] {
        &self.ticket
    }

    pub fn tmd(&self) -> &[u8] {
        &self.tmd
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn meta(&self) -> &[u8] {
        &self.meta
    }
}

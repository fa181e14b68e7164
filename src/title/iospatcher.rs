// title/iospatcher.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Module for applying the built-in exploit patches to IOSes.

use log::{debug, info};
use thiserror::Error;
use crate::title::{Title, TitleError};
use crate::title::content::{ContentError, ContentStaging};
use crate::title::patch::{apply_patches, Patch, PatchError};
use crate::title::signing::Signer;
use crate::title::tmd::ContentType;

#[derive(Debug, Error)]
pub enum IOSPatcherError {
    #[error("this title is not an IOS")]
    NotIOS,
    #[error("the specified slot `{0}` is not valid (must be between 3 and 255)")]
    InvalidSlot(u8),
    #[error("the required module \"{0}\" could not be found, this may not be a valid IOS")]
    ModuleNotFound(&'static str),
    #[error("failed to patch IOS content")]
    Patch(#[from] PatchError),
    #[error("failed to get IOS content")]
    Content(#[from] ContentError),
    #[error("failed to rebuild the patched title")]
    Title(#[from] TitleError),
}

/// The patches that can be applied to an IOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IOSPatch {
    /// Allows fakesigned titles to be installed (the trucha bug).
    Fakesigning,
    /// Allows ES_Identify to be called.
    EsIdentify,
    /// Allows /dev/flash to be opened.
    DevFlash,
    /// Allows titles to be downgraded.
    AllowDowngrade,
    /// Skips the disc drive inquiry. Experimental.
    DriveInquiry,
}

impl IOSPatch {
    /// Every patch except the experimental drive inquiry patch.
    pub const STANDARD: [IOSPatch; 4] = [IOSPatch::Fakesigning, IOSPatch::EsIdentify, IOSPatch::DevFlash, IOSPatch::AllowDowngrade];

    /// The keyword that identifies the module this patch applies to.
    pub fn module_keyword(&self) -> &'static str {
        match self {
            IOSPatch::DriveInquiry => "DIP:",
            _ => "ES:",
        }
    }

    /// Pairs of byte sequences to find and what to overwrite them with.
    fn sequences(&self) -> &'static [(&'static [u8], &'static [u8])] {
        match self {
            IOSPatch::Fakesigning => &[
                (&[0x20, 0x07, 0x23, 0xa2], &[0x20, 0x00, 0x23, 0xa2]),
                (&[0x20, 0x07, 0x4b, 0x0b], &[0x20, 0x00, 0x4b, 0x0b]),
            ],
            IOSPatch::EsIdentify => &[(&[0x28, 0x03, 0xd1, 0x23], &[0x28, 0x03, 0x00, 0x00])],
            IOSPatch::DevFlash => &[(&[0x42, 0x8b, 0xd0, 0x01, 0x25, 0x66], &[0x42, 0x8b, 0xe0, 0x01, 0x25, 0x66])],
            IOSPatch::AllowDowngrade => &[(&[0xd2, 0x01, 0x4e, 0x56], &[0xe0, 0x01, 0x4e, 0x56])],
            IOSPatch::DriveInquiry => &[(&[0x49, 0x4c, 0x23, 0x90, 0x68, 0x0a], &[0x20, 0x00, 0xe5, 0x38, 0x68, 0x0a])],
        }
    }

    /// Locates this patch in a module. Each sequence is patched at its first occurrence, and
    /// sequences that can't be found are left out.
    pub fn locate(&self, module: &[u8]) -> Vec<Patch> {
        self.sequences().iter()
            .filter_map(|(find, replace)| {
                let offset = module.windows(find.len()).position(|window| window == *find)?;
                Some(Patch { offset, original: find.to_vec(), replacement: replace.to_vec() })
            })
            .collect()
    }
}

/// Gets whether a Title ID belongs to an IOS, which excludes boot2 and the System Menu.
pub fn is_ios(title_id: [u8; 8]) -> bool {
    title_id[0..4] == [0, 0, 0, 1] && title_id[4..8] != [0, 0, 0, 1] && title_id[4..8] != [0, 0, 0, 2]
}

/// Holds an IOS with its contents decrypted while patches are applied to it.
pub struct IOSPatcher {
    title: Title,
    title_key: [u8; 16],
    staging: ContentStaging,
    patched: Vec<usize>,
}

impl IOSPatcher {
    /// Loads an IOS for patching. Every content is decrypted and verified up front.
    pub fn new(title: Title) -> Result<Self, IOSPatcherError> {
        if !is_ios(title.title_id()) {
            return Err(IOSPatcherError::NotIOS);
        }
        let title_key = title.ticket.title_key_dec();
        let staging = ContentStaging::from_region(&title.content, title_key, true)?;
        Ok(IOSPatcher { title, title_key, staging, patched: Vec::new() })
    }

    /// Finds the position of the first content containing a module's keyword.
    pub fn find_module(&self, keyword: &'static str) -> Result<usize, IOSPatcherError> {
        let keyword_bytes = keyword.as_bytes();
        self.staging.entries().iter()
            .position(|entry| entry.data.windows(keyword_bytes.len()).any(|window| window == keyword_bytes))
            .ok_or(IOSPatcherError::ModuleNotFound(keyword))
    }

    /// Applies a patch to its module and returns how many patch sites were found.
    pub fn apply(&mut self, patch: IOSPatch) -> Result<usize, IOSPatcherError> {
        let position = self.find_module(patch.module_keyword())?;
        let entry = &self.staging.entries()[position];
        let patches = patch.locate(&entry.data);
        debug!("{:?}: found {} patch sites in content {:08X}", patch, patches.len(), entry.content_id);
        if !patches.is_empty() {
            let content_type = entry.content_type;
            let patched = apply_patches(&entry.data, &patches)?;
            self.staging.replace(position, patched, content_type)?;
            if !self.patched.contains(&position) {
                self.patched.push(position);
            }
        }
        Ok(patches.len())
    }

    /// Moves the IOS to a new slot. The slot is the last byte of the Title ID.
    pub fn set_slot(&mut self, slot: u8) -> Result<(), IOSPatcherError> {
        if slot < 3 {
            return Err(IOSPatcherError::InvalidSlot(slot));
        }
        let mut title_id = self.title.title_id();
        title_id[4..8].copy_from_slice(&(slot as u32).to_be_bytes());
        self.title.set_title_id(title_id);
        Ok(())
    }

    pub fn set_version(&mut self, version: u16) {
        self.title.set_title_version(version);
    }

    /// Commits the patched contents back into the IOS and signs it. With `no_shared`, every
    /// patched content is made Normal so that it doesn't overwrite the copy other titles share.
    pub fn finish<S: Signer>(mut self, no_shared: bool, signer: &S) -> Result<Title, IOSPatcherError> {
        if no_shared {
            for position in &self.patched {
                self.staging.set_content_type(*position, ContentType::Normal)?;
            }
        }
        self.title.set_content_region(self.staging.into_region(self.title_key)?);
        self.title.resign(signer)?;
        info!("patched {} content(s) of {}", self.patched.len(), hex::encode(self.title.title_id()));
        Ok(self.title)
    }
}

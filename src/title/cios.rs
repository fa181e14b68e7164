// title/cios.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Builds a cIOS from a base IOS and a cIOS map.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use log::{debug, info};
use thiserror::Error;
use crate::title::{Title, TitleError};
use crate::title::ciosmap::{CiosMap, CiosMapError, ModulePlacement};
use crate::title::commonkeys::CommonKeySlot;
use crate::title::content::{ContentError, ContentStaging, StagedContent};
use crate::title::patch::{apply_patches, PatchError};
use crate::title::signing::{Fakesigner, Signer};
use crate::title::tmd::ContentType;

#[derive(Debug, Error)]
pub enum CiosError {
    #[error("the specified slot `{0}` is not valid (must be between 3 and 255)")]
    InvalidSlot(u32),
    #[error("the specified version `{0}` is not valid (must be between 0 and 65535)")]
    InvalidVersion(u32),
    #[error("the target cIOS `{0}` could not be found in the provided map")]
    GroupNotFound(String),
    #[error("the provided base (IOS{0}) doesn't match any bases found in the provided map")]
    BaseNotFound(u8),
    #[error("the provided base (IOS{ios} v{found}) doesn't match the required version (v{required})")]
    VersionMismatch { ios: u8, found: u16, required: u16 },
    #[error("the map patches content {0:08X}, which does not exist in the base")]
    PatchTargetNotFound(u32),
    #[error("failed to patch content {content_id:08X}, make sure the base IOS is valid")]
    Patch { content_id: u32, #[source] source: PatchError },
    #[error("the required module `{}` could not be found", .0.display())]
    ModuleNotFound(PathBuf),
    #[error("cIOS map processing error")]
    Map(#[from] CiosMapError),
    #[error("content processing error")]
    Content(#[from] ContentError),
    #[error("title processing error")]
    Title(#[from] TitleError),
    #[error("failed to read module")]
    IO(#[from] std::io::Error),
}

/// Settings for a single cIOS build.
#[derive(Debug, Clone)]
pub struct CiosBuildOptions {
    /// Name of the `<ciosgroup>` to build.
    pub cios_name: String,
    /// Directory holding the `<module>.app` files the map asks for.
    pub modules_dir: PathBuf,
    /// IOS slot the cIOS installs to.
    pub slot: u32,
    pub version: u32,
}

impl CiosBuildOptions {
    fn validate(&self) -> Result<(u8, u16), CiosError> {
        let slot = u8::try_from(self.slot)
            .ok()
            .filter(|slot| *slot >= 3)
            .ok_or(CiosError::InvalidSlot(self.slot))?;
        let version = u16::try_from(self.version).map_err(|_| CiosError::InvalidVersion(self.version))?;
        Ok((slot, version))
    }
}

fn read_module(options: &CiosBuildOptions, module: &str) -> Result<Vec<u8>, CiosError> {
    let path = options.modules_dir.join(format!("{module}.app"));
    fs::read(&path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => CiosError::ModuleNotFound(path),
        _ => CiosError::IO(err),
    })
}

/// Builds a cIOS from the WAD data of a base IOS and the text of a cIOS map, and returns the
/// fakesigned WAD data of the result.
pub fn build_cios(base: &[u8], map_xml: &str, options: &CiosBuildOptions) -> Result<Vec<u8>, CiosError> {
    options.validate()?;
    let map = CiosMap::parse(map_xml)?;
    let title = Title::from_bytes(base)?;
    let cios = build_cios_title(title, &map, options, &Fakesigner)?;
    Ok(cios.to_bytes()?)
}

/// Builds a cIOS from a loaded base IOS title, signing the result with the provided signer.
pub fn build_cios_title<S: Signer>(mut title: Title, map: &CiosMap<'_>, options: &CiosBuildOptions, signer: &S) -> Result<Title, CiosError> {
    let (slot, version) = options.validate()?;
    let group = map.group(&options.cios_name)
        .ok_or_else(|| CiosError::GroupNotFound(options.cios_name.clone()))?;
    // Bases are matched on the IOS number, which is the last byte of the Title ID.
    let mut title_id = title.title_id();
    let base_ios = title_id[7];
    let base = group.base(base_ios as u32)?.ok_or(CiosError::BaseNotFound(base_ios))?;
    if title.tmd.title_version() != base.version {
        return Err(CiosError::VersionMismatch { ios: base_ios, found: title.tmd.title_version(), required: base.version });
    }
    info!("building cIOS \"{}\" from base IOS{} v{}", group.name(), base_ios, base.version);

    let title_key = title.ticket.title_key_dec();
    let mut staging = ContentStaging::from_region(&title.content, title_key, true)?;

    // Patch existing modules. Every patch is applied before any module is added, so a bad base
    // is reported before a missing module.
    for entry in base.contents.iter().filter(|entry| !entry.patches.is_empty()) {
        let position = staging.position_of_cid(entry.content_id)
            .ok_or(CiosError::PatchTargetNotFound(entry.content_id))?;
        debug!("applying {} patches to content {:08X}", entry.patches.len(), entry.content_id);
        let patched = apply_patches(&staging.entries()[position].data, &entry.patches)
            .map_err(|source| CiosError::Patch { content_id: entry.content_id, source })?;
        staging.replace(position, patched, ContentType::Normal)?;
    }

    // Add the additional modules.
    for entry in &base.contents {
        let Some(module) = &entry.module else { continue };
        let staged = StagedContent {
            content_id: entry.content_id,
            content_type: ContentType::Normal,
            data: read_module(options, module)?,
        };
        match entry.placement {
            ModulePlacement::Append => {
                debug!("appending module {} as content {:08X}", module, entry.content_id);
                staging.push(staged);
            }
            ModulePlacement::Index(position) => {
                debug!("placing module {} at position {}", module, position);
                staging.insert_and_displace(position, staged)?;
            }
        }
    }
    title.set_content_region(staging.into_region(title_key)?);

    title_id[7] = slot;
    title.set_title_id(title_id);
    title.set_title_version(version);
    // cIOSes are always wrapped with the retail common key, so that vWii and development bases
    // can be installed to a retail Wii.
    let title_key = title.ticket.title_key_dec();
    title.ticket.wrap_title_key(title_key, CommonKeySlot::Retail);
    title.resign(signer)?;
    info!("built cIOS \"{}\" in slot {} with version {}", group.name(), slot, version);
    Ok(title)
}

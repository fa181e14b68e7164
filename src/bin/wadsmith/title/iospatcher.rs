// title/iospatcher.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Code for the iospatch command in the wadsmith CLI.

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use clap::Args;
use wadsmith::title;
use wadsmith::title::iospatcher::{IOSPatch, IOSPatcher};
use wadsmith::title::signing::Fakesigner;

#[derive(Args)]
#[clap(next_help_heading = "Patches")]
#[group(multiple = true)]
/// Patches that can be applied to an IOS.
pub struct EnabledPatches {
    /// Patch out signature checks
    #[arg(long, action)]
    sig_checks: bool,
    /// Patch in access to ES_Identify
    #[arg(long, action)]
    es_identify: bool,
    /// Patch in access to /dev/flash
    #[arg(long, action)]
    dev_flash: bool,
    /// Patch out anti-downgrade checks
    #[arg(long, action)]
    allow_downgrade: bool,
    /// Patch out drive inquiries (EXPERIMENTAL)
    #[arg(long, action)]
    drive_inquiry: bool,
    /// Apply every patch except the drive inquiry patch
    #[arg(short, long, action)]
    all: bool,
}

impl EnabledPatches {
    fn selected(&self) -> Vec<IOSPatch> {
        let flags = [
            (self.sig_checks || self.all, IOSPatch::Fakesigning),
            (self.es_identify || self.all, IOSPatch::EsIdentify),
            (self.dev_flash || self.all, IOSPatch::DevFlash),
            (self.allow_downgrade || self.all, IOSPatch::AllowDowngrade),
            (self.drive_inquiry, IOSPatch::DriveInquiry),
        ];
        flags.into_iter().filter(|(enabled, _)| *enabled).map(|(_, patch)| patch).collect()
    }
}

fn describe(patch: IOSPatch) -> &'static str {
    match patch {
        IOSPatch::Fakesigning => "signature check",
        IOSPatch::EsIdentify => "ES_Identify access",
        IOSPatch::DevFlash => "/dev/flash access",
        IOSPatch::AllowDowngrade => "allow downgrading",
        IOSPatch::DriveInquiry => "(EXPERIMENTAL) drive inquiry",
    }
}

pub fn patch_ios(
    input: &str,
    output: &Option<String>,
    version: &Option<u16>,
    slot: &Option<u8>,
    no_shared: &bool,
    enabled_patches: &EnabledPatches,
) -> Result<()> {
    let in_path = Path::new(input);
    if !in_path.exists() {
        bail!("Source WAD \"{}\" does not exist.", in_path.display());
    }
    let out_path = match output {
        Some(output) => PathBuf::from(output).with_extension("wad"),
        None => in_path.to_path_buf(),
    };
    let ios = title::Title::from_bytes(&fs::read(in_path).with_context(|| "Could not open WAD file for reading.")?)
        .with_context(|| "The provided WAD file could not be parsed, and is likely invalid.")?;
    let mut patcher = IOSPatcher::new(ios)
        .with_context(|| "The provided WAD does not appear to contain an IOS! No patches can be applied.")?;

    if let Some(version) = version {
        patcher.set_version(*version);
        println!("Set new IOS version: {version}");
    }
    if let Some(slot) = slot {
        patcher.set_slot(*slot)?;
        println!("Set new IOS slot: {slot}");
    }

    let mut patches_applied = 0;
    for patch in enabled_patches.selected() {
        print!("Applying {} patch... ", describe(patch));
        let count = patcher.apply(patch)
            .with_context(|| format!("The {} module could not be found in this IOS.", patch.module_keyword().trim_end_matches(':')))?;
        println!("{} patch(es) applied", count);
        patches_applied += count;
    }
    println!("\nTotal patches applied: {patches_applied}");

    if patches_applied == 0 && version.is_none() && slot.is_none() {
        bail!("No patches were applied. Please make sure the specified patches are compatible with this IOS.")
    }

    let ios = patcher.finish(*no_shared, &Fakesigner)?;
    fs::write(&out_path, ios.to_bytes()?).with_context(|| format!("Could not open output file \"{}\" for writing.", out_path.display()))?;
    println!("IOS successfully patched!");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn patches() -> EnabledPatches {
        EnabledPatches {
            sig_checks: false,
            es_identify: false,
            dev_flash: false,
            allow_downgrade: false,
            drive_inquiry: false,
            all: false,
        }
    }

    #[test]
    fn test_selected_patches() {
        assert!(patches().selected().is_empty());
        let all = EnabledPatches { all: true, drive_inquiry: true, ..patches() };
        assert_eq!(all.selected(), vec![
            IOSPatch::Fakesigning, IOSPatch::EsIdentify, IOSPatch::DevFlash, IOSPatch::AllowDowngrade, IOSPatch::DriveInquiry,
        ]);
        let some = EnabledPatches { es_identify: true, dev_flash: true, ..patches() };
        assert_eq!(some.selected(), vec![IOSPatch::EsIdentify, IOSPatch::DevFlash]);
    }

    #[test]
    fn test_missing_input() {
        let result = patch_ios("does-not-exist.wad", &None, &None, &None, &false, &patches());
        assert!(result.is_err());
    }
}

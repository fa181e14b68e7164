// nand/emunand.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Code for EmuNAND-related commands in the wadsmith CLI.

use std::fs;
use std::path::{absolute, Path};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use walkdir::WalkDir;
use wadsmith::nand::emunand::{self, InstallOptions, TitleRemoval};
use wadsmith::nand::layout::parse_title_id;
use wadsmith::title;

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
pub enum Commands {
    /// Display information about an EmuNAND
    Info {
        emunand: String,
    },
    /// Install a WAD file, or every WAD file in a directory, to an EmuNAND
    Install {
        /// The path to the WAD file or directory of WAD files to install
        input: String,
        /// The path to the target EmuNAND; it will be created if it doesn't exist
        emunand: String,
        /// Don't verify decrypted contents against the hashes in the TMD
        #[clap(long)]
        skip_hash: bool,
        /// Install the content at index 0 as title.met; this will override any meta/footer data
        /// included in the WAD
        #[clap(long)]
        override_meta: bool,
    },
    /// Uninstall a title from an EmuNAND
    Uninstall {
        /// The Title ID of the title to uninstall, or the path to a WAD file to read the Title ID
        /// from
        tid: String,
        /// The path to the target EmuNAND
        emunand: String,
    },
}

/// Formats a Title ID along with its ASCII form, if the low half is printable (e.g. "HABA").
fn describe_tid(title_id: [u8; 8]) -> String {
    let tid = hex::encode(title_id).to_ascii_uppercase();
    let low = &title_id[4..8];
    if low.iter().all(|c| c.is_ascii_alphanumeric()) {
        format!("{} ({})", tid, String::from_utf8_lossy(low))
    } else {
        tid
    }
}

pub fn info(emunand: &str) -> Result<()> {
    let emunand_path = Path::new(emunand);
    if !emunand_path.is_dir() {
        bail!("Target EmuNAND directory \"{}\" could not be found.", emunand_path.display());
    }
    let emunand = emunand::EmuNAND::new(emunand_path);
    let installed = emunand.installed_titles()
        .with_context(|| "Failed to scan the EmuNAND for installed titles.")?;
    // Summarize all the details of an EmuNAND.
    println!("EmuNAND Info");
    println!("  Path: {}", absolute(emunand_path)?.display());
    match emunand.get_title_tmd([0, 0, 0, 1, 0, 0, 0, 2])? {
        Some(tmd) => {
            println!("  System Menu Version: {}", tmd.title_version());
            println!("  Type: {}", if tmd.is_vwii() { "vWii" } else { "Wii" });
        },
        None => {
            println!("  System Menu Version: None");
        }
    }
    println!("  Installed Titles: {}", installed.len());
    let total_size: u64 = WalkDir::new(emunand.layout().root())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.metadata().map(|m| m.len()).unwrap_or(0))
        .sum();
    println!("  Space Used: {} blocks ({:.2} MB)", title::bytes_to_blocks(total_size), total_size as f64 / 1048576.0);
    if installed.is_empty() {
        return Ok(());
    }
    println!();
    println!("Titles:");
    let mut missing_ioses: Vec<[u8; 8]> = Vec::new();
    for title_id in &installed {
        println!("  {}", describe_tid(*title_id));
        let Some(tmd) = emunand.get_title_tmd(*title_id)? else {
            continue;
        };
        println!("    Version: {}", tmd.title_version());
        // System titles (IOS, boot2, the System Menu) have no IOS requirement worth reporting.
        if title_id[0..4] == [0, 0, 0, 1] {
            continue;
        }
        let ios_tid = tmd.ios_tid();
        print!("    Required IOS: IOS{} ({})", u32::from_be_bytes([ios_tid[4], ios_tid[5], ios_tid[6], ios_tid[7]]),
            hex::encode(ios_tid).to_ascii_uppercase());
        if installed.contains(&ios_tid) {
            println!();
        } else {
            println!(" *");
            if !missing_ioses.contains(&ios_tid) {
                missing_ioses.push(ios_tid);
            }
        }
    }
    if !missing_ioses.is_empty() {
        println!();
        println!("Some titles installed are missing their required IOS. These missing IOSes are \
        marked with \"*\" in the title list above. If these IOSes are not installed, the titles \
        requiring them will not launch.");
    }
    Ok(())
}

pub fn install(input: &str, emunand: &str, skip_hash: &bool, override_meta: &bool) -> Result<()> {
    let in_path = Path::new(input);
    if !in_path.exists() {
        bail!("Source WAD or directory \"{}\" could not be found.", in_path.display());
    }
    let emunand_path = Path::new(emunand);
    let emunand = emunand::EmuNAND::new(emunand_path);
    let options = InstallOptions { skip_hash: *skip_hash, override_meta: *override_meta };
    let report = emunand.install_path(in_path, options)
        .with_context(|| format!("Failed to install \"{}\" to EmuNAND at \"{}\".", in_path.display(), emunand_path.display()))?;
    if in_path.is_file() {
        println!("Successfully installed WAD \"{}\" to EmuNAND at \"{}\"!", in_path.display(), emunand_path.display());
        return Ok(());
    }
    let failed = report.failures.len();
    for failure in report.failures {
        let path = failure.path.display().to_string();
        println!("  Failed to install \"{}\": {:#}", path, anyhow::Error::new(failure.error));
    }
    println!("Installed {} of {} WAD(s) to EmuNAND at \"{}\".", report.installed, report.attempted, emunand_path.display());
    if failed > 0 {
        bail!("{} WAD(s) could not be installed.", failed);
    }
    Ok(())
}

pub fn uninstall(tid: &str, emunand: &str) -> Result<()> {
    let emunand_path = Path::new(emunand);
    if !emunand_path.is_dir() {
        bail!("Target EmuNAND directory \"{}\" could not be found.", emunand_path.display());
    }
    let tid_as_path = Path::new(&tid);
    let tid_bin: [u8; 8] = if tid_as_path.is_file() {
        let wad_file = fs::read(tid_as_path).with_context(|| format!("Failed to open WAD file \"{}\" for reading.", tid_as_path.display()))?;
        let title = title::Title::from_bytes(&wad_file).with_context(|| format!("The provided WAD file \"{}\" appears to be invalid.", tid_as_path.display()))?;
        title.title_id()
    } else {
        parse_title_id(tid)?
    };
    let emunand = emunand::EmuNAND::new(emunand_path);
    let report = emunand.uninstall_title(tid_bin)?;
    let tid = hex::encode(tid_bin).to_ascii_uppercase();
    match report.title {
        TitleRemoval::NotInstalled => {
            println!("Title with Title ID \"{}\" is not installed to EmuNAND at \"{}\".", tid, emunand_path.display());
        },
        TitleRemoval::ContentOnly => {
            println!("Successfully uninstalled title with Title ID \"{}\" from EmuNAND at \"{}\"! Its save data was kept.", tid, emunand_path.display());
        },
        TitleRemoval::Full => {
            println!("Successfully uninstalled title with Title ID \"{}\" from EmuNAND at \"{}\"!", tid, emunand_path.display());
        },
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_describe_tid() {
        assert_eq!(describe_tid([0x00, 0x01, 0x00, 0x02, 0x48, 0x41, 0x42, 0x41]), "0001000248414241 (HABA)");
        assert_eq!(describe_tid([0, 0, 0, 1, 0, 0, 0, 0x38]), "0000000100000038");
    }
}

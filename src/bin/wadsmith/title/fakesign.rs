// title/fakesign.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Code for the fakesign command in the wadsmith CLI.

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use wadsmith::title::{self, tmd, ticket};
use wadsmith::title::signing::{is_fakesigned, Fakesigner, Signer};
use crate::filetypes::{WiiFileType, identify_file_type};

fn output_path(input: &str, output: &Option<String>, extension: &str) -> PathBuf {
    match output {
        Some(output) => PathBuf::from(output).with_extension(extension),
        None => PathBuf::from(input),
    }
}

pub fn fakesign(input: &str, output: &Option<String>) -> Result<()> {
    let in_path = Path::new(input);
    if !in_path.exists() {
        bail!("Input file \"{}\" does not exist.", in_path.display());
    }
    match identify_file_type(input) {
        Some(WiiFileType::Wad) => {
            let out_path = output_path(input, output, "wad");
            // Load WAD into a Title instance, then fakesign it.
            let mut title = title::Title::from_bytes(&fs::read(in_path).with_context(|| "Could not open WAD file for reading.")?)
                .with_context(|| "The provided WAD file could not be parsed, and is likely invalid.")?;
            if title.is_fakesigned() {
                println!("WAD is already fakesigned.");
            } else {
                title.fakesign().with_context(|| "An unknown error occurred while fakesigning the provided WAD.")?;
            }
            // Write output file.
            fs::write(out_path, title.to_bytes()?).with_context(|| "Could not open output file for writing.")?;
            println!("WAD fakesigned!");
        },
        Some(WiiFileType::Tmd) => {
            let out_path = output_path(input, output, "tmd");
            // Load TMD into a TMD instance, then fakesign it.
            let mut tmd = tmd::TMD::from_bytes(&fs::read(in_path).with_context(|| "Could not open TMD file for reading.")?)
                .with_context(|| "The provided TMD file could not be parsed, and is likely invalid.")?;
            if is_fakesigned(&tmd) {
                println!("TMD is already fakesigned.");
            } else {
                Fakesigner.sign(&mut tmd).with_context(|| "An unknown error occurred while fakesigning the provided TMD.")?;
            }
            // Write output file.
            fs::write(out_path, tmd.to_bytes()?).with_context(|| "Could not open output file for writing.")?;
            println!("TMD fakesigned!");
        },
        Some(WiiFileType::Ticket) => {
            let out_path = output_path(input, output, "tik");
            // Load Ticket into a Ticket instance, then fakesign it.
            let mut ticket = ticket::Ticket::from_bytes(&fs::read(in_path).with_context(|| "Could not open Ticket file for reading.")?)
                .with_context(|| "The provided Ticket file could not be parsed, and is likely invalid.")?;
            if is_fakesigned(&ticket) {
                println!("Ticket is already fakesigned.");
            } else {
                Fakesigner.sign(&mut ticket).with_context(|| "An unknown error occurred while fakesigning the provided Ticket.")?;
            }
            // Write output file.
            fs::write(out_path, ticket.to_bytes()?).with_context(|| "Could not open output file for writing.")?;
            println!("Ticket fakesigned!");
        },
        None => {
            bail!("You can only fakesign TMDs, Tickets, and WADs!");
        }
    }
    Ok(())
}

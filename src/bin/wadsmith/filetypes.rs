// filetypes.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Common code for identifying the Wii file types the CLI can sign.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use regex::RegexBuilder;

#[derive(Debug, PartialEq)]
pub enum WiiFileType {
    Wad,
    Tmd,
    Ticket,
}

/// The first 8 bytes of a WAD: a 0x20 byte header size followed by the type ("Is" or "ib").
const WAD_MAGICS: [&[u8; 8]; 2] = [b"\x00\x00\x00\x20\x49\x73\x00\x00", b"\x00\x00\x00\x20\x69\x62\x00\x00"];

pub fn identify_file_type(input: &str) -> Option<WiiFileType> {
    let input = Path::new(input);
    let file_name = input.file_name()?.to_str()?;
    let re = RegexBuilder::new(r"^tmd(\.[0-9]+)?$").case_insensitive(true).build().ok()?;
    // == TMD ==
    if re.is_match(file_name) ||
        file_name.eq_ignore_ascii_case("tmd.bin") ||
        input.extension().is_some_and(|f| f.eq_ignore_ascii_case("tmd")) {
        return Some(WiiFileType::Tmd);
    }
    // == Ticket ==
    if input.extension().is_some_and(|f| f.eq_ignore_ascii_case("tik")) ||
        file_name.eq_ignore_ascii_case("ticket.bin") ||
        file_name.eq_ignore_ascii_case("cetk") {
        return Some(WiiFileType::Ticket);
    }
    // == WAD ==
    if input.extension().is_some_and(|f| f.eq_ignore_ascii_case("wad")) {
        return Some(WiiFileType::Wad);
    }

    // == Advanced ==
    // WADs have no real magic number, but the header size and type at the start are always
    // the same, so check those last to avoid opening the file unless we have to.
    let mut magic_number = [0u8; 8];
    File::open(input).ok()?.read_exact(&mut magic_number).ok()?;
    if WAD_MAGICS.contains(&&magic_number) {
        return Some(WiiFileType::Wad);
    }

    // == No match found! ==
    None
}

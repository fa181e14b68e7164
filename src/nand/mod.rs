// nand/mod.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Root for the modules that manage titles installed to an EmuNAND.

pub mod content_map;
pub mod emunand;
pub mod layout;
pub mod sys;

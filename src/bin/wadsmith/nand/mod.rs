// nand/mod.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Commands that operate on EmuNANDs.

pub mod emunand;

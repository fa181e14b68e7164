// title/mod.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Commands that operate on titles and their component files.

pub mod cios;
pub mod fakesign;
pub mod iospatcher;

// lib.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Root level module that imports the feature modules.

pub mod nand;
pub mod title;

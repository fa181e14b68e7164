// title/cios.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Code for the cios command in the wadsmith CLI.

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use clap::Args;
use wadsmith::title::cios::{self, CiosBuildOptions};

#[derive(Args)]
pub struct CiosArgs {
    /// The base IOS WAD to build the cIOS from
    base: String,
    /// The cIOS map XML describing the patches and modules for each cIOS
    map: String,
    /// The name of the cIOS to build, as it appears in the map
    cios_name: String,
    /// The IOS slot to install the cIOS to (3-255)
    #[arg(short, long)]
    slot: u32,
    /// The version number to give the cIOS (0-65535)
    #[arg(short, long)]
    version: u32,
    /// The directory containing the cIOS modules; defaults to the directory of the map
    #[arg(short, long)]
    modules: Option<String>,
    /// An (optional) output name; defaults to <base>-<cios>-slot<slot>-v<version>.wad next to the
    /// base IOS
    #[arg(short, long)]
    output: Option<String>,
}

fn default_output(base_path: &Path, args: &CiosArgs) -> PathBuf {
    let stem = base_path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
    base_path.with_file_name(format!("{}-{}-slot{}-v{}.wad", stem, args.cios_name, args.slot, args.version))
}

pub fn build_cios(args: &CiosArgs) -> Result<()> {
    let base_path = Path::new(&args.base);
    if !base_path.exists() {
        bail!("Base IOS WAD \"{}\" could not be found.", base_path.display());
    }
    let map_path = Path::new(&args.map);
    if !map_path.exists() {
        bail!("cIOS map \"{}\" could not be found.", map_path.display());
    }
    let modules_dir = match &args.modules {
        Some(modules) => PathBuf::from(modules),
        None => map_path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    if !modules_dir.as_os_str().is_empty() && !modules_dir.is_dir() {
        bail!("cIOS modules directory \"{}\" could not be found.", modules_dir.display());
    }
    let out_path = match &args.output {
        Some(output) => PathBuf::from(output).with_extension("wad"),
        None => default_output(base_path, args),
    };
    let base = fs::read(base_path).with_context(|| format!("Failed to open base IOS WAD \"{}\" for reading.", base_path.display()))?;
    let map = fs::read_to_string(map_path).with_context(|| format!("Failed to open cIOS map \"{}\" for reading.", map_path.display()))?;
    let options = CiosBuildOptions {
        cios_name: args.cios_name.clone(),
        modules_dir,
        slot: args.slot,
        version: args.version,
    };
    println!("Building cIOS \"{}\" in slot {} (v{})...", args.cios_name, args.slot, args.version);
    let cios = cios::build_cios(&base, &map, &options)
        .with_context(|| format!("The cIOS \"{}\" could not be built.", args.cios_name))?;
    fs::write(&out_path, cios).with_context(|| format!("Could not open output file \"{}\" for writing.", out_path.display()))?;
    println!("Successfully built cIOS \"{}\" to \"{}\"!", args.cios_name, out_path.display());
    Ok(())
}

// main.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Base for the wadsmith CLI that handles argument parsing and directs execution to the proper module.

mod filetypes;
mod nand;
mod title;

use anyhow::Result;
use clap::{Subcommand, Parser};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
#[command(arg_required_else_help = true)]
enum Commands {
    /// Build a cIOS from a base IOS WAD and a cIOS map
    Cios(title::cios::CiosArgs),
    /// Manage Wii EmuNANDs
    Emunand {
        #[command(subcommand)]
        command: nand::emunand::Commands,
    },
    /// Fakesign a TMD, Ticket, or WAD (trucha bug)
    Fakesign {
        /// The path to a TMD, Ticket, or WAD
        input: String,
        /// An (optional) output name; defaults to overwriting input file if not provided
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Apply exploit patches to an IOS
    Iospatch {
        /// The IOS WAD to apply the patches to
        input: String,
        /// An (optional) output name; defaults to overwriting input file if not provided
        #[arg(short, long)]
        output: Option<String>,
        /// Set a new version for the IOS
        #[arg(short, long)]
        version: Option<u16>,
        /// Set the slot that this IOS will install to (3-255)
        #[arg(short, long)]
        slot: Option<u8>,
        /// Set all patched contents to be non-shared
        #[arg(long, action)]
        no_shared: bool,
        #[command(flatten)]
        enabled_patches: title::iospatcher::EnabledPatches,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Cios(args)) => {
            title::cios::build_cios(args)?
        },
        Some(Commands::Emunand { command }) => {
            match command {
                nand::emunand::Commands::Info { emunand } => {
                    nand::emunand::info(emunand)?
                },
                nand::emunand::Commands::Install { input, emunand, skip_hash, override_meta } => {
                    nand::emunand::install(input, emunand, skip_hash, override_meta)?
                },
                nand::emunand::Commands::Uninstall { tid, emunand } => {
                    nand::emunand::uninstall(tid, emunand)?
                },
            }
        },
        Some(Commands::Fakesign { input, output }) => {
            title::fakesign::fakesign(input, output)?
        },
        Some(Commands::Iospatch { input, output, version, slot, no_shared, enabled_patches }) => {
            title::iospatcher::patch_ios(input, output, version, slot, no_shared, enabled_patches)?
        },
        None => { /* Clap handles no passed command by itself */ }
    }
    Ok(())
}

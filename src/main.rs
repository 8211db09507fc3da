//! fwflash - Firmware update flash manager
//!
//! Host front end for the flash manager in `fwflash-core`. Every command
//! that touches flash runs against a flash image file through the
//! simulated flash in `fwflash-sim`, using exactly the controller, session
//! and metadata logic a device runs:
//!
//! - `update` erases, programs and verifies an image and records its CRC
//! - `validate` performs the boot-time integrity check
//! - `info` shows the integrity record and bootloader version
//! - `crc`, `plan` and `stamp` work on plain files

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Crc { input } => commands::crc::run(&input),
        Commands::Plan { kind, size } => commands::plan::run(kind, size),
        Commands::Update {
            flash,
            kind,
            input,
            chunk,
            expected_crc,
            software_crc,
        } => commands::update::run(
            &flash,
            kind,
            &input,
            &commands::update::UpdateOptions {
                chunk,
                expected_crc,
                software_crc,
            },
        ),
        Commands::Validate { flash } => match commands::validate::run(&flash) {
            Ok(true) => Ok(()),
            Ok(false) => std::process::exit(1),
            Err(e) => Err(e),
        },
        Commands::Info { flash } => commands::info::run(&flash),
        Commands::Stamp {
            input,
            output,
            version,
            build_date,
        } => commands::stamp::run(
            &input,
            output.as_deref().unwrap_or(&input),
            &version,
            &build_date,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

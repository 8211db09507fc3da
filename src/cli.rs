//! CLI argument parsing

use clap::{Parser, Subcommand};
use fwflash_core::layout::ImageKind;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse an image kind name
fn parse_kind(s: &str) -> Result<ImageKind, String> {
    s.parse::<ImageKind>()
        .map_err(|_| format!("Unknown image kind '{}' (expected bootloader or application)", s))
}

#[derive(Parser)]
#[command(name = "fwflash")]
#[command(author, version, about = "Firmware update flash manager", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the CRC-32 of a file
    Crc {
        /// Input file path
        input: PathBuf,
    },

    /// Show which sectors an update would erase
    Plan {
        /// Image kind (bootloader or application)
        #[arg(short, long, value_parser = parse_kind)]
        kind: ImageKind,

        /// Declared image size in bytes (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        size: u32,
    },

    /// Write an image into a flash image file
    Update {
        /// Flash image file (created erased if missing)
        #[arg(short, long)]
        flash: PathBuf,

        /// Image kind (bootloader or application)
        #[arg(short, long, value_parser = parse_kind)]
        kind: ImageKind,

        /// Firmware image to write
        #[arg(short, long)]
        input: PathBuf,

        /// Bytes per write call
        #[arg(long, default_value = "1024", value_parser = parse_hex_u32)]
        chunk: u32,

        /// Expected CRC-32 of the image (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        expected_crc: Option<u32>,

        /// Compute the CRC in software instead of the accelerator model
        #[arg(long)]
        software_crc: bool,
    },

    /// Check the stored application image against its integrity record
    Validate {
        /// Flash image file
        #[arg(short, long)]
        flash: PathBuf,
    },

    /// Show metadata stored in a flash image file
    Info {
        /// Flash image file
        #[arg(short, long)]
        flash: PathBuf,
    },

    /// Stamp a version record into a bootloader image
    Stamp {
        /// Bootloader image to stamp
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Version string (at most 32 bytes)
        #[arg(long)]
        version: String,

        /// Build date string (at most 32 bytes)
        #[arg(long)]
        build_date: String,
    },
}

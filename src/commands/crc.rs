//! CRC command implementation

use fwflash_core::crc::{Crc32Engine, HardwareCrc32, SoftCrcUnit, SoftwareCrc32};
use std::fs;
use std::path::Path;

/// Run the crc command
pub fn run(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    let software = SoftwareCrc32::new().checksum(&data);
    let hardware = HardwareCrc32::new(SoftCrcUnit::new()).checksum(&data);
    log::debug!(
        "software CRC 0x{:08X}, accelerator CRC 0x{:08X}",
        software,
        hardware
    );

    if software != hardware {
        return Err(format!(
            "CRC paths disagree: software 0x{:08X}, accelerator 0x{:08X}",
            software, hardware
        )
        .into());
    }

    println!("{:?}: {} bytes, CRC-32 0x{:08X}", input, data.len(), software);
    Ok(())
}

//! Validate command implementation

use fwflash_core::crc::{HardwareCrc32, SoftCrcUnit};
use fwflash_core::metadata::{ImageValidity, MetadataReader};
use std::path::Path;

/// Run the validate command
///
/// Returns whether the application would be started.
pub fn run(flash_path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let flash = super::open_device(flash_path)?;
    let store = MetadataReader::new(&flash);

    let record = store.read_application_metadata();
    let validity = store.validate_application(&mut HardwareCrc32::new(SoftCrcUnit::new()));

    match validity {
        ImageValidity::Valid => println!(
            "Application valid: {} bytes, CRC-32 0x{:08X}",
            record.application_size, record.application_crc32
        ),
        ImageValidity::Invalid => println!(
            "Application INVALID (record: {} bytes, CRC-32 0x{:08X})",
            record.application_size, record.application_crc32
        ),
        ImageValidity::Unknown => println!("Application unknown: no integrity record present"),
    }

    Ok(validity == ImageValidity::Valid)
}

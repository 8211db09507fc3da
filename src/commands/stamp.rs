//! Stamp command implementation

use fwflash_core::layout::{FlashMap, ERASED_BYTE};
use fwflash_core::metadata::BootloaderVersionRecord;
use std::fs;
use std::path::Path;

/// Run the stamp command
///
/// Writes the version record at its fixed offset in a bootloader image,
/// padding the image with erased bytes if it ends before the record.
pub fn run(
    input: &Path,
    output: &Path,
    version: &str,
    build_date: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = BootloaderVersionRecord::new(version, build_date)?;
    let mut image = fs::read(input)?;

    let map = FlashMap::STM32F4;
    let offset = (map.bootloader_version_addr - map.bootloader.start) as usize;
    let raw = record.to_bytes();
    let end = offset + raw.len();
    if end > map.bootloader.max_size as usize {
        return Err("Version record lies outside the bootloader region".into());
    }

    let existing = image.get(offset..end.min(image.len())).unwrap_or(&[]);
    if existing.iter().any(|&b| b != ERASED_BYTE) {
        log::warn!(
            "overwriting existing data at version record offset 0x{:X}",
            offset
        );
    }
    if image.len() < end {
        image.resize(end, ERASED_BYTE);
    }
    image[offset..end].copy_from_slice(&raw);

    fs::write(output, &image)?;
    println!(
        "Stamped {:?} with version '{}', build date '{}' ({} bytes)",
        output,
        version,
        build_date,
        image.len()
    );
    Ok(())
}

//! Info command implementation

use fwflash_core::layout::ImageKind;
use fwflash_core::metadata::MetadataReader;
use std::path::Path;

/// Run the info command
pub fn run(flash_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let flash = super::open_device(flash_path)?;
    let map = *flash.map();

    println!(
        "Flash:       0x{:08X}-0x{:08X} ({} bytes, {} sectors)",
        map.base,
        map.end(),
        map.size,
        map.sectors.len()
    );
    for kind in [ImageKind::Bootloader, ImageKind::Application] {
        let region = map.region(kind);
        println!(
            "{:<12} 0x{:08X}-0x{:08X}",
            format!("{}:", kind),
            region.start,
            region.end()
        );
    }

    let store = MetadataReader::new(&flash);
    let record = store.read_application_metadata();
    if record.is_legacy() {
        println!("Application: no integrity record");
    } else {
        println!(
            "Application: {} bytes, CRC-32 0x{:08X}",
            record.application_size, record.application_crc32
        );
    }

    let version = store.read_bootloader_version()?;
    println!("Bootloader version:    {}", version.version);
    println!("Bootloader build date: {}", version.build_date);

    Ok(())
}

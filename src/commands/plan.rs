//! Plan command implementation

use fwflash_core::layout::{FirmwareImageRequest, FlashMap, ImageKind};
use fwflash_core::planner;

/// Run the plan command
pub fn run(kind: ImageKind, size: u32) -> Result<(), Box<dyn std::error::Error>> {
    let map = FlashMap::STM32F4;
    let region = map.region(kind);
    let plan = planner::plan_erase(&map, &FirmwareImageRequest::new(kind, size))?;

    println!(
        "{} image of {} bytes at 0x{:08X} (max {} bytes)",
        kind, size, region.start, region.max_size
    );
    println!("{:<8} {:<12} {:>10}", "Sector", "Start", "Size");
    for &index in plan.iter() {
        if let Some(sector) = map.sector(index) {
            let note = if region.metadata_sector == Some(index) {
                " (metadata)"
            } else {
                ""
            };
            println!(
                "{:<8} 0x{:08X}   {:>10}{}",
                sector.index, sector.start, sector.capacity, note
            );
        }
    }
    println!(
        "{} sector(s), {} bytes erased",
        plan.len(),
        planner::plan_size(&map, &plan)
    );

    Ok(())
}

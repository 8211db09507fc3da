//! Update command implementation

use fwflash_core::crc::{Crc32Engine, HardwareCrc32, SoftCrcUnit, SoftwareCrc32};
use fwflash_core::flash::FlashController;
use fwflash_core::layout::{FirmwareImageRequest, ImageKind};
use fwflash_core::planner;
use fwflash_core::port::FlashPort;
use fwflash_core::session::{CompletedImage, UpdateSession};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Options for the update command
pub struct UpdateOptions {
    /// Bytes handed to each session write
    pub chunk: u32,
    /// CRC-32 the written image must have
    pub expected_crc: Option<u32>,
    /// Use the bit-serial engine instead of the accelerator model
    pub software_crc: bool,
}

/// Run the update command
///
/// The flash image file is saved whether or not the update succeeds, so a
/// failed update leaves it in the state a device would be left in.
pub fn run(
    flash_path: &Path,
    kind: ImageKind,
    input: &Path,
    options: &UpdateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.chunk == 0 {
        return Err("Chunk size must be at least 1 byte".into());
    }

    let image = fs::read(input)?;
    println!("Read {} bytes from {:?}", image.len(), input);
    let declared =
        u32::try_from(image.len()).map_err(|_| "Image does not fit a 32-bit size field")?;

    let mut flash = super::open_device(flash_path)?;
    let result = program(&mut flash, kind, declared, &image, options);
    flash.port().save(flash_path)?;

    let done = result?;
    println!(
        "Updated {} image: {} bytes, CRC-32 0x{:08X}",
        done.kind, done.size, done.crc32
    );
    Ok(())
}

fn program<P: FlashPort>(
    flash: &mut FlashController<P>,
    kind: ImageKind,
    declared: u32,
    image: &[u8],
    options: &UpdateOptions,
) -> Result<CompletedImage, Box<dyn std::error::Error>> {
    let request = FirmwareImageRequest::new(kind, declared);
    let plan = planner::plan_erase(flash.map(), &request)?;
    let erase_bytes = planner::plan_size(flash.map(), &plan);

    let mut session = UpdateSession::new(flash, request);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Erasing sectors {:?} ({} bytes)...",
        plan.as_slice(),
        erase_bytes
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    if let Err(e) = session.start() {
        spinner.abandon_with_message("Erase failed");
        return Err(e.into());
    }
    spinner.finish_with_message("Erase complete");

    let pb = ProgressBar::new(declared as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) Writing")?
            .progress_chars("#>-"),
    );

    for chunk in image.chunks(options.chunk as usize) {
        let addr = session.next_address();
        let outcome = session.write(addr, chunk);
        pb.set_position(session.cursor() as u64);

        if let Some(fault) = outcome.fault {
            pb.abandon_with_message("Write failed");
            return Err(format!(
                "Write stopped after {} of {} bytes at 0x{:08X}: {}",
                session.cursor(),
                declared,
                addr + outcome.bytes_written,
                fault
            )
            .into());
        }
    }
    pb.finish_with_message("Write complete");

    let mut engine: Box<dyn Crc32Engine> = if options.software_crc {
        Box::new(SoftwareCrc32::new())
    } else {
        Box::new(HardwareCrc32::new(SoftCrcUnit::new()))
    };
    Ok(session.finish(engine.as_mut(), options.expected_crc)?)
}

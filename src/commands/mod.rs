//! CLI command implementations
//!
//! Commands that work on a device open a flash image file as a
//! [`SimFlash`] and drive it through a [`FlashController`], so the same
//! code paths run here as on the target.

pub mod crc;
pub mod info;
pub mod plan;
pub mod stamp;
pub mod update;
pub mod validate;

use fwflash_core::flash::FlashController;
use fwflash_sim::{SimConfig, SimFlash};
use std::path::Path;

/// Open a flash image file, starting from erased flash if it is missing
fn open_device(path: &Path) -> Result<FlashController<SimFlash>, Box<dyn std::error::Error>> {
    let config = SimConfig::default();
    let port = SimFlash::open_or_create(config, path)?;
    Ok(FlashController::new(port, config.map))
}

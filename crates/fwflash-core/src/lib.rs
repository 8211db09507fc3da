//! fwflash-core - Firmware image flash manager
//!
//! This crate holds the logic that erases, programs, verifies and checksums
//! the on-chip flash holding a bootloader image or an application image, and
//! that persists the integrity record the boot path uses to decide whether
//! the application can be trusted. It is `no_std` and talks to the hardware
//! only through the traits in [`port`].
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for the error types
//!
//! # Example
//!
//! ```ignore
//! use fwflash_core::crc::SoftwareCrc32;
//! use fwflash_core::flash::FlashController;
//! use fwflash_core::layout::{FirmwareImageRequest, FlashMap, ImageKind};
//! use fwflash_core::port::FlashPort;
//! use fwflash_core::session::UpdateSession;
//!
//! fn update<P: FlashPort>(port: P, image: &[u8]) -> fwflash_core::Result<()> {
//!     let mut flash = FlashController::new(port, FlashMap::STM32F4);
//!     let request = FirmwareImageRequest::new(ImageKind::Application, image.len() as u32);
//!     let start = flash.map().application.start;
//!
//!     let mut session = UpdateSession::new(&mut flash, request);
//!     session.start()?;
//!     session.write(start, image).into_result()?;
//!     session.finish(&mut SoftwareCrc32::new(), None)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod crc;
pub mod error;
pub mod flash;
pub mod layout;
pub mod metadata;
pub mod planner;
pub mod port;
pub mod session;

pub use error::{FlashFault, Result};

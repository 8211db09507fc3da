//! Boot metadata
//!
//! Two records live at fixed addresses from the flash map:
//!
//! - the application integrity record (size and CRC-32), written by an
//!   update session after the whole image has been verified and checked by
//!   the boot path before jumping to the application;
//! - the bootloader version record (version and build date strings), part
//!   of the bootloader image itself and only ever read here.
//!
//! Erased flash reads as all ones. A record in that state predates the
//! field and is reported as unknown or absent, never as malformed.

use core::fmt;

use heapless::String;

use crate::crc::Crc32Engine;
use crate::error::{ConfigFault, Result};
use crate::flash::FlashController;
use crate::layout::{ERASED_BYTE, ERASED_WORD};
use crate::port::FlashPort;

/// Size of one bootloader version field
pub const VERSION_FIELD_LEN: usize = 32;

/// Stored size and checksum of the application image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityRecord {
    /// Image size in bytes
    pub application_size: u32,
    /// CRC-32 of the image
    pub application_crc32: u32,
}

impl IntegrityRecord {
    /// The record as found in erased flash
    pub const LEGACY: Self = Self {
        application_size: ERASED_WORD,
        application_crc32: ERASED_WORD,
    };

    /// Whether this is the erased-flash sentinel
    pub fn is_legacy(&self) -> bool {
        *self == Self::LEGACY
    }
}

/// Verdict on the stored application image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageValidity {
    /// Stored CRC matches the image
    Valid,
    /// Stored size out of bounds or CRC mismatch
    Invalid,
    /// No record has ever been written
    Unknown,
}

impl fmt::Display for ImageValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One 32-byte version field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionField {
    /// Field is erased; the bootloader predates version stamping
    Absent,
    /// NUL-padded text
    Text(String<VERSION_FIELD_LEN>),
}

impl VersionField {
    /// Build a text field
    pub fn text(s: &str) -> Result<Self> {
        let mut text = String::new();
        text.push_str(s).map_err(|_| ConfigFault::VersionTooLong)?;
        Ok(Self::Text(text))
    }

    /// Get the text, if present
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::Text(text) => Some(text.as_str()),
        }
    }

    /// Decode a raw field
    ///
    /// Text ends at the first NUL or at the end of the field. Bytes that are
    /// not valid UTF-8 end the text as well.
    pub fn from_bytes(raw: &[u8; VERSION_FIELD_LEN]) -> Self {
        if raw.iter().all(|&b| b == ERASED_BYTE) {
            return Self::Absent;
        }

        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let valid = match core::str::from_utf8(&raw[..len]) {
            Ok(s) => s,
            // Prefix up to valid_up_to is valid UTF-8 by definition
            Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or(""),
        };

        let mut text = String::new();
        // Cannot overflow, the source is at most VERSION_FIELD_LEN bytes
        let _ = text.push_str(valid);
        Self::Text(text)
    }

    /// Encode into a raw field
    pub fn to_bytes(&self) -> [u8; VERSION_FIELD_LEN] {
        match self {
            Self::Absent => [ERASED_BYTE; VERSION_FIELD_LEN],
            Self::Text(text) => {
                let mut raw = [0u8; VERSION_FIELD_LEN];
                raw[..text.len()].copy_from_slice(text.as_bytes());
                raw
            }
        }
    }
}

impl fmt::Display for VersionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Bootloader identification strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloaderVersionRecord {
    /// Version string
    pub version: VersionField,
    /// Build date string
    pub build_date: VersionField,
}

impl BootloaderVersionRecord {
    /// Build a record from two strings of at most 32 bytes each
    pub fn new(version: &str, build_date: &str) -> Result<Self> {
        Ok(Self {
            version: VersionField::text(version)?,
            build_date: VersionField::text(build_date)?,
        })
    }

    /// Decode the 64-byte block at the version address
    pub fn from_bytes(raw: &[u8; 2 * VERSION_FIELD_LEN]) -> Self {
        let mut version = [0u8; VERSION_FIELD_LEN];
        let mut build_date = [0u8; VERSION_FIELD_LEN];
        version.copy_from_slice(&raw[..VERSION_FIELD_LEN]);
        build_date.copy_from_slice(&raw[VERSION_FIELD_LEN..]);
        Self {
            version: VersionField::from_bytes(&version),
            build_date: VersionField::from_bytes(&build_date),
        }
    }

    /// Encode the 64-byte block a bootloader build places at the version address
    pub fn to_bytes(&self) -> [u8; 2 * VERSION_FIELD_LEN] {
        let mut raw = [0u8; 2 * VERSION_FIELD_LEN];
        raw[..VERSION_FIELD_LEN].copy_from_slice(&self.version.to_bytes());
        raw[VERSION_FIELD_LEN..].copy_from_slice(&self.build_date.to_bytes());
        raw
    }
}

/// Read-only access to the metadata records
///
/// Needs only a shared borrow of the controller, so the boot path can
/// validate an image without any claim on write access.
#[derive(Debug, Clone, Copy)]
pub struct MetadataReader<'a, P: FlashPort> {
    flash: &'a FlashController<P>,
}

impl<'a, P: FlashPort> MetadataReader<'a, P> {
    /// Borrow a controller for reading metadata
    pub fn new(flash: &'a FlashController<P>) -> Self {
        Self { flash }
    }

    /// Read the integrity record without validating it
    pub fn read_application_metadata(&self) -> IntegrityRecord {
        let map = self.flash.map();
        IntegrityRecord {
            application_size: self.flash.read_word(map.app_size_addr),
            application_crc32: self.flash.read_word(map.app_crc_addr),
        }
    }

    /// Check the application image against its stored record
    ///
    /// This is the only gate the boot path uses before jumping to the
    /// application.
    pub fn validate_application<C: Crc32Engine + ?Sized>(&self, engine: &mut C) -> ImageValidity {
        let record = self.read_application_metadata();
        if record.is_legacy() {
            log::info!("no application metadata present");
            return ImageValidity::Unknown;
        }

        let region = self.flash.map().application;
        let size = record.application_size;
        if size == 0 || size > region.max_size {
            log::warn!(
                "stored application size {} outside 1..={}",
                size,
                region.max_size
            );
            return ImageValidity::Invalid;
        }

        let computed = match self.flash.crc32(region.start, size, engine) {
            Ok(crc) => crc,
            Err(e) => {
                log::warn!("cannot checksum application: {}", e);
                return ImageValidity::Invalid;
            }
        };

        if computed == record.application_crc32 {
            log::debug!("application CRC 0x{:08X} matches", computed);
            ImageValidity::Valid
        } else {
            log::warn!(
                "application CRC mismatch: stored 0x{:08X}, computed 0x{:08X}",
                record.application_crc32,
                computed
            );
            ImageValidity::Invalid
        }
    }

    /// Read the bootloader version record
    pub fn read_bootloader_version(&self) -> Result<BootloaderVersionRecord> {
        let map = self.flash.map();
        let mut version = [0u8; VERSION_FIELD_LEN];
        let mut build_date = [0u8; VERSION_FIELD_LEN];
        self.flash.read(map.bootloader_version_addr, &mut version)?;
        self.flash.read(map.bootloader_build_date_addr, &mut build_date)?;
        Ok(BootloaderVersionRecord {
            version: VersionField::from_bytes(&version),
            build_date: VersionField::from_bytes(&build_date),
        })
    }
}

/// Read and write access to the metadata records
pub struct MetadataStore<'a, P: FlashPort> {
    flash: &'a mut FlashController<P>,
}

impl<'a, P: FlashPort> MetadataStore<'a, P> {
    /// Borrow a controller for metadata access
    pub fn new(flash: &'a mut FlashController<P>) -> Self {
        Self { flash }
    }

    /// Reborrow as a read-only view
    pub fn reader(&self) -> MetadataReader<'_, P> {
        MetadataReader::new(self.flash)
    }

    /// Persist the integrity record
    ///
    /// Only call this after every byte of the image has been verified. Both
    /// words must still be erased, which holds right after the metadata
    /// sector was erased by the same update.
    pub fn write_application_metadata(&mut self, size: u32, crc: u32) -> Result<()> {
        let map = *self.flash.map();
        self.flash.write_word_verified(map.app_crc_addr, crc)?;
        self.flash.write_word_verified(map.app_size_addr, size)?;
        log::info!(
            "stored application metadata: {} bytes, CRC 0x{:08X}",
            size,
            crc
        );
        Ok(())
    }

    /// See [`MetadataReader::read_application_metadata`]
    pub fn read_application_metadata(&self) -> IntegrityRecord {
        self.reader().read_application_metadata()
    }

    /// See [`MetadataReader::validate_application`]
    pub fn validate_application<C: Crc32Engine + ?Sized>(&self, engine: &mut C) -> ImageValidity {
        self.reader().validate_application(engine)
    }

    /// See [`MetadataReader::read_bootloader_version`]
    pub fn read_bootloader_version(&self) -> Result<BootloaderVersionRecord> {
        self.reader().read_bootloader_version()
    }
}

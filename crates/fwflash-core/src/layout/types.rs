//! Flash map types
//!
//! The flash map is the single configuration value describing where every
//! image, sector and metadata field lives. It is built once (normally from a
//! `const`) and handed to the controller, planner and metadata store.

use core::fmt;
use core::str::FromStr;

use crate::error::ConfigFault;

/// The erased value of a flash byte (all bits set)
pub const ERASED_BYTE: u8 = 0xFF;

/// The erased value of a flash word (all bits set)
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Which firmware image a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// The bootloader image at the bottom of flash
    Bootloader,
    /// The application image the bootloader jumps to
    Application,
}

impl ImageKind {
    /// Lowercase name of this kind
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bootloader => "bootloader",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageKind {
    type Err = ConfigFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("bootloader") || s.eq_ignore_ascii_case("boot") {
            Ok(Self::Bootloader)
        } else if s.eq_ignore_ascii_case("application") || s.eq_ignore_ascii_case("app") {
            Ok(Self::Application)
        } else {
            Err(ConfigFault::UnknownImageKind)
        }
    }
}

/// The image an update session is going to write
///
/// Immutable once a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareImageRequest {
    /// Target image
    pub kind: ImageKind,
    /// Size of the image in bytes
    pub declared_size: u32,
}

impl FirmwareImageRequest {
    /// Create a new request
    pub const fn new(kind: ImageKind, declared_size: u32) -> Self {
        Self {
            kind,
            declared_size,
        }
    }
}

/// Fixed geometry of one hardware erase sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorInfo {
    /// Hardware sector number
    pub index: u8,
    /// First address of the sector
    pub start: u32,
    /// Size of the sector in bytes
    pub capacity: u32,
}

impl SectorInfo {
    /// Create a new sector description
    pub const fn new(index: u8, start: u32, capacity: u32) -> Self {
        Self {
            index,
            start,
            capacity,
        }
    }

    /// One past the last address of the sector
    pub const fn end(&self) -> u32 {
        self.start + self.capacity
    }

    /// Check if an address is within this sector
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// What the controller knows about a sector's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectorState {
    /// Not touched since the controller was created
    #[default]
    Unknown,
    /// Erased and not programmed since
    Erased,
    /// At least one program operation hit this sector
    Programmed,
}

/// A sector together with its tracked state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashSector {
    /// Fixed geometry
    pub info: SectorInfo,
    /// Tracked state
    pub state: SectorState,
}

/// One entry of an image's erase table
///
/// `threshold` is the cumulative capacity, measured from the region start,
/// once `sector` has been erased. Tables are ordered by ascending threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    /// Cumulative capacity after this sector
    pub threshold: u32,
    /// Sector to erase
    pub sector: u8,
}

impl PlanStep {
    /// Create a new table entry
    pub const fn new(threshold: u32, sector: u8) -> Self {
        Self { threshold, sector }
    }
}

/// Placement of one image kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    /// First address of the image
    pub start: u32,
    /// Largest image the region accepts
    pub max_size: u32,
    /// Erase table walked by the planner
    pub plan: &'static [PlanStep],
    /// Sector holding this image's metadata, always erased with the image
    pub metadata_sector: Option<u8>,
}

impl RegionInfo {
    /// One past the largest address an image may occupy
    pub const fn end(&self) -> u32 {
        self.start + self.max_size
    }
}

/// Complete description of the flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashMap {
    /// First flash address
    pub base: u32,
    /// Total flash size in bytes
    pub size: u32,
    /// Hardware sector table, ascending by index and address
    ///
    /// A controller tracks at most `flash::MAX_SECTORS` sectors and refuses
    /// to unlock flash for a longer table.
    pub sectors: &'static [SectorInfo],
    /// Bootloader image placement
    pub bootloader: RegionInfo,
    /// Application image placement
    pub application: RegionInfo,
    /// Address of the stored application CRC-32
    pub app_crc_addr: u32,
    /// Address of the stored application size
    pub app_size_addr: u32,
    /// Address of the 32-byte bootloader version string
    pub bootloader_version_addr: u32,
    /// Address of the 32-byte bootloader build date string
    pub bootloader_build_date_addr: u32,
}

impl FlashMap {
    /// One past the last flash address
    pub const fn end(&self) -> u32 {
        self.base + self.size
    }

    /// Get the placement of an image kind
    pub const fn region(&self, kind: ImageKind) -> &RegionInfo {
        match kind {
            ImageKind::Bootloader => &self.bootloader,
            ImageKind::Application => &self.application,
        }
    }

    /// Look up a sector by hardware index
    pub fn sector(&self, index: u8) -> Option<&SectorInfo> {
        self.sectors.iter().find(|s| s.index == index)
    }

    /// Find the sector containing an address
    pub fn sector_at(&self, addr: u32) -> Option<&SectorInfo> {
        self.sectors.iter().find(|s| s.contains(addr))
    }

    /// Check if an address range lies entirely within flash
    pub fn contains_range(&self, addr: u32, len: usize) -> bool {
        // u64 so that addr + len cannot wrap
        let end = addr as u64 + len as u64;
        addr >= self.base && end <= self.end() as u64
    }
}

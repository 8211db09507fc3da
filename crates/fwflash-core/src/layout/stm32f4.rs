//! Flash map of a 1 MiB STM32F4-class part
//!
//! ```text
//! 0x0800_0000  sectors 0-3   4 x 16 KiB   bootloader
//! 0x0800_FFC0                32 bytes     bootloader version string
//! 0x0800_FFE0                32 bytes     bootloader build date string
//! 0x0801_0000  sector 4      64 KiB       application
//! 0x0802_0000  sectors 5-11  7 x 128 KiB  application
//! 0x080F_FFF8                4 bytes      application CRC-32
//! 0x080F_FFFC                4 bytes      application size
//! ```

use super::types::{FlashMap, PlanStep, RegionInfo, SectorInfo};

/// First flash address
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Total flash size
pub const FLASH_SIZE: u32 = 1024 * 1024;

const KIB: u32 = 1024;

/// Hardware sector table
pub const SECTORS: [SectorInfo; 12] = [
    SectorInfo::new(0, 0x0800_0000, 16 * KIB),
    SectorInfo::new(1, 0x0800_4000, 16 * KIB),
    SectorInfo::new(2, 0x0800_8000, 16 * KIB),
    SectorInfo::new(3, 0x0800_C000, 16 * KIB),
    SectorInfo::new(4, 0x0801_0000, 64 * KIB),
    SectorInfo::new(5, 0x0802_0000, 128 * KIB),
    SectorInfo::new(6, 0x0804_0000, 128 * KIB),
    SectorInfo::new(7, 0x0806_0000, 128 * KIB),
    SectorInfo::new(8, 0x0808_0000, 128 * KIB),
    SectorInfo::new(9, 0x080A_0000, 128 * KIB),
    SectorInfo::new(10, 0x080C_0000, 128 * KIB),
    SectorInfo::new(11, 0x080E_0000, 128 * KIB),
];

/// Bootloader image start
pub const BOOTLOADER_START: u32 = 0x0800_0000;

/// Bootloader version string, last 64 bytes of the bootloader region
pub const BOOTLOADER_VERSION_ADDR: u32 = 0x0800_FFC0;

/// Bootloader build date string
pub const BOOTLOADER_BUILD_DATE_ADDR: u32 = 0x0800_FFE0;

/// Application image start
pub const APPLICATION_START: u32 = 0x0801_0000;

/// Stored application CRC-32
pub const APP_CRC_ADDR: u32 = 0x080F_FFF8;

/// Stored application size
pub const APP_SIZE_ADDR: u32 = 0x080F_FFFC;

/// Sector shared by the top of the application and its integrity record
pub const METADATA_SECTOR: u8 = 11;

const BOOTLOADER_PLAN: [PlanStep; 4] = [
    PlanStep::new(0x0000_4000, 0),
    PlanStep::new(0x0000_8000, 1),
    PlanStep::new(0x0000_C000, 2),
    PlanStep::new(0x0001_0000, 3),
];

const APPLICATION_PLAN: [PlanStep; 8] = [
    PlanStep::new(0x0001_0000, 4),
    PlanStep::new(0x0003_0000, 5),
    PlanStep::new(0x0005_0000, 6),
    PlanStep::new(0x0007_0000, 7),
    PlanStep::new(0x0009_0000, 8),
    PlanStep::new(0x000B_0000, 9),
    PlanStep::new(0x000D_0000, 10),
    PlanStep::new(0x000F_0000, 11),
];

impl FlashMap {
    /// Flash map of a 1 MiB STM32F4-class part
    pub const STM32F4: FlashMap = FlashMap {
        base: FLASH_BASE,
        size: FLASH_SIZE,
        sectors: &SECTORS,
        bootloader: RegionInfo {
            start: BOOTLOADER_START,
            // The version record is part of the bootloader image
            max_size: 0x0001_0000,
            plan: &BOOTLOADER_PLAN,
            metadata_sector: None,
        },
        application: RegionInfo {
            start: APPLICATION_START,
            max_size: APP_CRC_ADDR - APPLICATION_START,
            plan: &APPLICATION_PLAN,
            metadata_sector: Some(METADATA_SECTOR),
        },
        app_crc_addr: APP_CRC_ADDR,
        app_size_addr: APP_SIZE_ADDR,
        bootloader_version_addr: BOOTLOADER_VERSION_ADDR,
        bootloader_build_date_addr: BOOTLOADER_BUILD_DATE_ADDR,
    };
}

impl Default for FlashMap {
    fn default() -> Self {
        Self::STM32F4
    }
}

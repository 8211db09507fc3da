//! Error types for fwflash-core
//!
//! Every fault is a plain `Copy` value carrying the address, sector or
//! values needed to diagnose it. Nothing in this crate panics or retries on
//! a fault; it is handed back to the immediate caller.

use core::fmt;

use crate::layout::ImageKind;
use crate::port::FlashStatus;

/// Faults detected before any hardware access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFault {
    /// Image kind name not recognized
    UnknownImageKind,
    /// Flash map does not fit controller limits (sector count or erase plan)
    InvalidMap,
    /// Declared image size exceeds the capacity of the kind's region
    ImageTooLarge {
        /// Image kind of the request
        kind: ImageKind,
        /// Declared size in bytes
        declared: u32,
        /// Largest size the region accepts
        max: u32,
    },
    /// An update session was requested for an empty image
    EmptyImage,
    /// Address range lies outside the flash
    AddressOutOfBounds {
        /// Start address of the range
        addr: u32,
        /// Length of the range in bytes
        len: u32,
    },
    /// Word access at an address that is not 4-byte aligned
    Misaligned {
        /// Offending address
        addr: u32,
    },
    /// Session write does not continue where the previous one ended
    NonContiguousWrite {
        /// Address the session expected next
        expected: u32,
        /// Address the caller supplied
        actual: u32,
    },
    /// Session write runs past the declared image size
    WriteBeyondImage {
        /// Declared image size
        declared: u32,
        /// Image offset the write would end at
        end: u32,
    },
    /// Session finished before the whole declared image was written
    IncompleteImage {
        /// Bytes verified so far
        written: u32,
        /// Declared image size
        declared: u32,
    },
    /// Version string does not fit its 32-byte field
    VersionTooLong,
    /// Operation not allowed in the session's current state
    InvalidSessionState,
}

/// Faults reported by the flash hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareFault {
    /// Flash interface is still locked
    Locked,
    /// Sector erase did not report completion
    EraseIncomplete {
        /// Index of the sector whose erase failed
        sector: u8,
        /// Status flags reported by the hardware
        status: FlashStatus,
    },
    /// Program operation did not report completion
    ProgramIncomplete {
        /// Address being programmed
        addr: u32,
        /// Status flags reported by the hardware
        status: FlashStatus,
    },
}

/// A read-back after erase or programming did not hold the intended value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Address of the mismatch
    pub addr: u32,
    /// Value that should have been read
    pub expected: u32,
    /// Value that was actually read
    pub actual: u32,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashFault {
    /// Invalid request, rejected with zero side effects
    Config(ConfigFault),
    /// The hardware reported a failed operation
    Hardware(HardwareFault),
    /// Read-back mismatch after programming
    Verification(VerifyFailure),
}

impl FlashFault {
    /// Whether this fault was raised before touching the hardware
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether this fault leaves the affected flash in an unknown state
    ///
    /// Hardware and verification faults both mean the location cannot be
    /// reprogrammed without a fresh erase.
    pub fn needs_erase(&self) -> bool {
        matches!(self, Self::Hardware(_) | Self::Verification(_))
    }
}

impl From<ConfigFault> for FlashFault {
    fn from(fault: ConfigFault) -> Self {
        Self::Config(fault)
    }
}

impl From<HardwareFault> for FlashFault {
    fn from(fault: HardwareFault) -> Self {
        Self::Hardware(fault)
    }
}

impl From<VerifyFailure> for FlashFault {
    fn from(failure: VerifyFailure) -> Self {
        Self::Verification(failure)
    }
}

impl fmt::Display for ConfigFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownImageKind => write!(f, "unknown image kind"),
            Self::InvalidMap => write!(f, "flash map exceeds controller limits"),
            Self::ImageTooLarge {
                kind,
                declared,
                max,
            } => write!(
                f,
                "{} image of {} bytes exceeds region capacity of {} bytes",
                kind, declared, max
            ),
            Self::EmptyImage => write!(f, "image is empty"),
            Self::AddressOutOfBounds { addr, len } => write!(
                f,
                "range 0x{:08X}+{} lies outside flash",
                addr, len
            ),
            Self::Misaligned { addr } => {
                write!(f, "address 0x{:08X} is not word aligned", addr)
            }
            Self::NonContiguousWrite { expected, actual } => write!(
                f,
                "write at 0x{:08X} does not continue image at 0x{:08X}",
                actual, expected
            ),
            Self::WriteBeyondImage { declared, end } => write!(
                f,
                "write ending at offset {} runs past declared size {}",
                end, declared
            ),
            Self::IncompleteImage { written, declared } => write!(
                f,
                "image incomplete: {} of {} bytes written",
                written, declared
            ),
            Self::VersionTooLong => write!(f, "version string longer than 32 bytes"),
            Self::InvalidSessionState => write!(f, "operation not allowed in session state"),
        }
    }
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "flash interface is locked"),
            Self::EraseIncomplete { sector, status } => write!(
                f,
                "erase of sector {} did not complete (status {:?})",
                sector, status
            ),
            Self::ProgramIncomplete { addr, status } => write!(
                f,
                "program at 0x{:08X} did not complete (status {:?})",
                addr, status
            ),
        }
    }
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verify failed at 0x{:08X}: expected 0x{:08X}, found 0x{:08X}",
            self.addr, self.expected, self.actual
        )
    }
}

impl fmt::Display for FlashFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(fault) => write!(f, "configuration fault: {}", fault),
            Self::Hardware(fault) => write!(f, "hardware fault: {}", fault),
            Self::Verification(failure) => write!(f, "verification fault: {}", failure),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FlashFault {}

/// Result type alias using the core error type
pub type Result<T> = core::result::Result<T, FlashFault>;

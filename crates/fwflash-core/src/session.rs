//! Update session state machine
//!
//! One session replaces one image:
//!
//! ```text
//! Idle -> Unlocked -> Erased -> Writing(cursor) -> Complete
//!                        \            |
//!                         `---------> Failed
//! ```
//!
//! Hardware and verification faults move the session to `Failed`, which is
//! terminal. Configuration faults (bad address, wrong state, oversized
//! image) are returned without touching the hardware or changing state.
//!
//! The integrity record of an application image is only written by
//! [`UpdateSession::finish`], after every declared byte has been verified.
//! A session that is dropped early leaves the record erased, so the boot
//! path rejects the partial image.

use core::fmt;

use crate::crc::Crc32Engine;
use crate::error::{ConfigFault, FlashFault, Result, VerifyFailure};
use crate::flash::{FlashController, WriteOutcome};
use crate::layout::{FirmwareImageRequest, ImageKind};
use crate::metadata::MetadataStore;
use crate::planner;
use crate::port::FlashPort;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing done yet
    Idle,
    /// Flash interface unlocked, erase not finished
    Unlocked,
    /// Target sectors erased, no bytes written
    Erased,
    /// Bytes `0..cursor` of the image written and verified
    Writing {
        /// Image offset of the next byte
        cursor: u32,
    },
    /// Image written, checked and (for applications) recorded
    Complete,
    /// A hardware or verification fault ended the session
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Unlocked => write!(f, "unlocked"),
            Self::Erased => write!(f, "erased"),
            Self::Writing { cursor } => write!(f, "writing ({} bytes done)", cursor),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedImage {
    /// Image kind written
    pub kind: ImageKind,
    /// Image size in bytes
    pub size: u32,
    /// CRC-32 of the image as read back from flash
    pub crc32: u32,
}

/// A single image update driven through a flash controller
pub struct UpdateSession<'a, P: FlashPort> {
    flash: &'a mut FlashController<P>,
    request: FirmwareImageRequest,
    state: SessionState,
}

impl<'a, P: FlashPort> UpdateSession<'a, P> {
    /// Create an idle session for `request`
    pub fn new(flash: &'a mut FlashController<P>, request: FirmwareImageRequest) -> Self {
        Self {
            flash,
            request,
            state: SessionState::Idle,
        }
    }

    /// Get the request this session was created for
    pub fn request(&self) -> &FirmwareImageRequest {
        &self.request
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of image bytes written and verified so far
    pub fn cursor(&self) -> u32 {
        match self.state {
            SessionState::Writing { cursor } => cursor,
            SessionState::Complete => self.request.declared_size,
            _ => 0,
        }
    }

    /// Address the next write must start at
    pub fn next_address(&self) -> u32 {
        self.flash.map().region(self.request.kind).start + self.cursor()
    }

    /// Unlock the flash and erase every sector the image needs
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(ConfigFault::InvalidSessionState.into());
        }
        if self.request.declared_size == 0 {
            return Err(ConfigFault::EmptyImage.into());
        }
        // Reject an impossible request before the hardware is touched
        planner::plan_erase(self.flash.map(), &self.request)?;

        log::info!(
            "starting {} update, {} bytes",
            self.request.kind,
            self.request.declared_size
        );

        if let Err(e) = self.flash.initialize() {
            return Err(self.fail(e));
        }
        self.state = SessionState::Unlocked;

        if let Err(e) = self
            .flash
            .erase_region(self.request.kind, self.request.declared_size)
        {
            return Err(self.fail(e));
        }
        self.state = SessionState::Erased;
        Ok(())
    }

    /// Program the next piece of the image
    ///
    /// `addr` must be exactly where the previous write ended, and the write
    /// must stay inside the declared image size. The outcome's byte count is
    /// the number of leading bytes verified; a fault ends the session.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> WriteOutcome {
        let cursor = match self.state {
            SessionState::Erased => 0,
            SessionState::Writing { cursor } => cursor,
            _ => return WriteOutcome::failed(0, ConfigFault::InvalidSessionState.into()),
        };

        let expected = self.flash.map().region(self.request.kind).start + cursor;
        if addr != expected {
            return WriteOutcome::failed(
                0,
                ConfigFault::NonContiguousWrite {
                    expected,
                    actual: addr,
                }
                .into(),
            );
        }

        let declared = self.request.declared_size;
        let end = cursor as u64 + data.len() as u64;
        if end > declared as u64 {
            return WriteOutcome::failed(
                0,
                ConfigFault::WriteBeyondImage {
                    declared,
                    end: end.min(u32::MAX as u64) as u32,
                }
                .into(),
            );
        }

        let outcome = self.flash.write_verified(addr, data);
        let cursor = cursor + outcome.bytes_written;
        match outcome.fault {
            Some(fault) => {
                log::error!("{} update failed at image offset {}", self.request.kind, cursor);
                self.fail(fault);
            }
            None => {
                log::debug!("{} of {} bytes written", cursor, declared);
                self.state = SessionState::Writing { cursor };
            }
        }
        outcome
    }

    /// Close the session once the whole image is written
    ///
    /// Computes the CRC-32 of the image as programmed. If `expected_crc` is
    /// given it must match. For an application image the integrity record
    /// is written last, making the image bootable.
    pub fn finish<C: Crc32Engine + ?Sized>(
        &mut self,
        engine: &mut C,
        expected_crc: Option<u32>,
    ) -> Result<CompletedImage> {
        let written = match self.state {
            SessionState::Erased => 0,
            SessionState::Writing { cursor } => cursor,
            _ => return Err(ConfigFault::InvalidSessionState.into()),
        };
        let declared = self.request.declared_size;
        if written != declared {
            return Err(ConfigFault::IncompleteImage { written, declared }.into());
        }

        let kind = self.request.kind;
        let start = self.flash.map().region(kind).start;
        let crc32 = match self.flash.crc32(start, declared, engine) {
            Ok(crc) => crc,
            Err(e) => return Err(self.fail(e)),
        };

        if let Some(expected) = expected_crc {
            if expected != crc32 {
                log::error!(
                    "{} image CRC 0x{:08X} does not match expected 0x{:08X}",
                    kind,
                    crc32,
                    expected
                );
                return Err(self.fail(
                    VerifyFailure {
                        addr: start,
                        expected,
                        actual: crc32,
                    }
                    .into(),
                ));
            }
        }

        if kind == ImageKind::Application {
            let stored = MetadataStore::new(&mut *self.flash)
                .write_application_metadata(declared, crc32);
            if let Err(e) = stored {
                return Err(self.fail(e));
            }
        }

        self.state = SessionState::Complete;
        log::info!(
            "{} update complete: {} bytes, CRC 0x{:08X}",
            kind,
            declared,
            crc32
        );
        Ok(CompletedImage {
            kind,
            size: declared,
            crc32,
        })
    }

    fn fail(&mut self, fault: FlashFault) -> FlashFault {
        if fault.is_config() {
            return fault;
        }
        log::warn!("update session failed in state {}: {}", self.state, fault);
        self.state = SessionState::Failed;
        fault
    }
}

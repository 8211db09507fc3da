//! Flash controller
//!
//! Wraps a [`FlashPort`] with the operations an update needs: unlock, plan
//! driven sector erase, byte-wise programming with read-back, and two-phase
//! verified word writes. Nothing here retries; every fault is returned with
//! the sector or address it happened at.

use crate::crc::Crc32Engine;
use crate::error::{ConfigFault, HardwareFault, Result, VerifyFailure};
use crate::layout::{
    FirmwareImageRequest, FlashMap, FlashSector, ImageKind, SectorState, ERASED_WORD,
};
use crate::planner::{self, EraseSequence};
use crate::port::{FlashPort, FlashStatus};

use super::outcome::WriteOutcome;

/// Most sectors a flash map may describe
pub const MAX_SECTORS: usize = 32;

/// Runtime state for flash operations on one device
#[derive(Debug)]
pub struct FlashController<P: FlashPort> {
    port: P,
    map: FlashMap,
    unlocked: bool,
    states: [SectorState; MAX_SECTORS],
}

impl<P: FlashPort> FlashController<P> {
    /// Create a controller for the given port and flash map
    ///
    /// A map with more than [`MAX_SECTORS`] sectors is accepted here but
    /// refused by [`initialize`](Self::initialize), so no hardware is ever
    /// touched through it.
    pub fn new(port: P, map: FlashMap) -> Self {
        Self {
            port,
            map,
            unlocked: false,
            states: [SectorState::Unknown; MAX_SECTORS],
        }
    }

    /// Get the flash map
    pub fn map(&self) -> &FlashMap {
        &self.map
    }

    /// Get a reference to the port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Whether [`initialize`](Self::initialize) has succeeded
    pub fn is_initialized(&self) -> bool {
        self.unlocked
    }

    /// Unlock the flash interface for writing
    ///
    /// Must be called before any erase or program. Calling it again once
    /// unlocked does not touch the hardware.
    pub fn initialize(&mut self) -> Result<()> {
        if self.unlocked {
            return Ok(());
        }
        if self.map.sectors.len() > MAX_SECTORS {
            log::error!(
                "flash map has {} sectors, at most {} supported",
                self.map.sectors.len(),
                MAX_SECTORS
            );
            return Err(ConfigFault::InvalidMap.into());
        }

        self.port.unlock();
        if self.port.is_locked() {
            log::error!("flash interface still locked after unlock sequence");
            return Err(HardwareFault::Locked.into());
        }
        self.port.clear_status_flags();
        self.unlocked = true;

        log::debug!("flash interface unlocked");
        Ok(())
    }

    /// Get a sector together with its tracked state
    pub fn sector(&self, index: u8) -> Option<FlashSector> {
        let slot = self.map.sectors.iter().position(|s| s.index == index)?;
        Some(FlashSector {
            info: self.map.sectors[slot],
            state: self.states.get(slot).copied().unwrap_or_default(),
        })
    }

    /// Iterate over all sectors with their tracked state
    pub fn sectors(&self) -> impl Iterator<Item = FlashSector> + '_ {
        self.map
            .sectors
            .iter()
            .zip(self.states.iter())
            .map(|(&info, &state)| FlashSector { info, state })
    }

    /// Erase every sector an image of `declared_size` bytes needs
    ///
    /// An oversized request is rejected before any hardware access. Sectors
    /// are erased in ascending order; the first sector that does not report
    /// completion, or does not read back blank, stops the erase.
    pub fn erase_region(&mut self, kind: ImageKind, declared_size: u32) -> Result<()> {
        let plan =
            planner::plan_erase(&self.map, &FirmwareImageRequest::new(kind, declared_size))?;
        self.ensure_unlocked()?;

        log::info!(
            "erasing {} sector(s) for {} image of {} bytes",
            plan.len(),
            kind,
            declared_size
        );

        self.erase_sequence(&plan)
    }

    fn erase_sequence(&mut self, plan: &EraseSequence) -> Result<()> {
        for &index in plan.iter() {
            let slot = self
                .map
                .sectors
                .iter()
                .position(|s| s.index == index)
                .ok_or(ConfigFault::InvalidMap)?;

            self.port.clear_status_flags();
            let status = self.port.erase_sector(index);
            if !status.completed() {
                self.set_state(slot, SectorState::Unknown);
                log::error!("erase of sector {} failed: {:?}", index, status);
                return Err(HardwareFault::EraseIncomplete {
                    sector: index,
                    status,
                }
                .into());
            }

            let sector = self.map.sectors[slot];
            if let Err(e) = self.check_erased(sector.start, sector.capacity) {
                self.set_state(slot, SectorState::Unknown);
                log::error!("sector {} not blank after erase: {}", index, e);
                return Err(e);
            }

            self.set_state(slot, SectorState::Erased);
            log::debug!(
                "erased sector {} (0x{:08X}, {} bytes)",
                index,
                sector.start,
                sector.capacity
            );
        }

        Ok(())
    }

    /// Check that a range reads back as erased
    fn check_erased(&self, addr: u32, len: u32) -> Result<()> {
        let mut offset = 0;
        while offset < len {
            let word_addr = addr + offset;
            let actual = self.port.read_word(word_addr);
            if actual != ERASED_WORD {
                return Err(VerifyFailure {
                    addr: word_addr,
                    expected: ERASED_WORD,
                    actual,
                }
                .into());
            }
            offset += 4;
        }
        Ok(())
    }

    /// Program a buffer byte by byte, reading each byte back
    ///
    /// Stops at the first byte that fails to program or reads back wrong.
    /// The returned count is the number of leading bytes confirmed correct;
    /// bytes after the failing one are never touched.
    pub fn write_verified(&mut self, addr: u32, data: &[u8]) -> WriteOutcome {
        if let Err(fault) = self.ensure_unlocked() {
            return WriteOutcome::failed(0, fault);
        }
        if let Err(fault) = self.check_range(addr, data.len()) {
            return WriteOutcome::failed(0, fault);
        }

        for (offset, &byte) in data.iter().enumerate() {
            let target = addr + offset as u32;

            self.port.clear_status_flags();
            let status = self.port.program_byte(target, byte);
            self.mark_programmed(target);

            let fault = if !status.completed() {
                Some(program_fault(target, status))
            } else {
                let actual = self.port.read_byte(target);
                (actual != byte).then(|| {
                    VerifyFailure {
                        addr: target,
                        expected: byte as u32,
                        actual: actual as u32,
                    }
                    .into()
                })
            };

            if let Some(fault) = fault {
                log::warn!(
                    "write stopped after {} of {} bytes: {}",
                    offset,
                    data.len(),
                    fault
                );
                return WriteOutcome::failed(offset as u32, fault);
            }
        }

        log::trace!("wrote {} bytes at 0x{:08X}", data.len(), addr);
        WriteOutcome::complete(data.len() as u32)
    }

    /// Read one word
    ///
    /// `addr` must be word aligned and inside the map; the port decides
    /// what an unaligned or unmapped read returns.
    pub fn read_word(&self, addr: u32) -> u32 {
        self.port.read_word(addr)
    }

    /// Read flash contents into a buffer
    pub fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        for (offset, byte) in buf.iter_mut().enumerate() {
            *byte = self.port.read_byte(addr + offset as u32);
        }
        Ok(())
    }

    /// Write one word in two verified phases
    ///
    /// Programming can only clear bits, so the location is first driven to
    /// the erased value and checked, and only then programmed with `value`
    /// and checked again. A location that is not blank fails the first
    /// phase instead of silently ending up with `value & old`.
    pub fn write_word_verified(&mut self, addr: u32, value: u32) -> Result<()> {
        self.ensure_unlocked()?;
        if addr % 4 != 0 {
            return Err(ConfigFault::Misaligned { addr }.into());
        }
        self.check_range(addr, 4)?;

        for target in [ERASED_WORD, value] {
            self.port.clear_status_flags();
            let status = self.port.program_word(addr, target);
            self.mark_programmed(addr);
            if !status.completed() {
                log::error!("program of word at 0x{:08X} failed: {:?}", addr, status);
                return Err(program_fault(addr, status));
            }

            let actual = self.port.read_word(addr);
            if actual != target {
                log::error!(
                    "word at 0x{:08X} reads 0x{:08X}, expected 0x{:08X}",
                    addr,
                    actual,
                    target
                );
                return Err(VerifyFailure {
                    addr,
                    expected: target,
                    actual,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Checksum a flash range with the given engine
    ///
    /// The range is fed a word at a time, so `addr` must be word aligned.
    /// A trailing partial word is fed byte-wise.
    pub fn crc32<C: Crc32Engine + ?Sized>(
        &self,
        addr: u32,
        len: u32,
        engine: &mut C,
    ) -> Result<u32> {
        if addr % 4 != 0 {
            return Err(ConfigFault::Misaligned { addr }.into());
        }
        self.check_range(addr, len as usize)?;

        engine.begin();
        let words_end = addr + (len & !3);
        let mut cursor = addr;
        while cursor < words_end {
            engine.feed_word(self.port.read_word(cursor));
            cursor += 4;
        }

        let mut tail = [0u8; 3];
        let tail = &mut tail[..(len & 3) as usize];
        for (offset, byte) in tail.iter_mut().enumerate() {
            *byte = self.port.read_byte(words_end + offset as u32);
        }
        Ok(engine.finish(tail))
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.unlocked {
            Ok(())
        } else {
            Err(HardwareFault::Locked.into())
        }
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if self.map.contains_range(addr, len) {
            Ok(())
        } else {
            Err(ConfigFault::AddressOutOfBounds {
                addr,
                len: len as u32,
            }
            .into())
        }
    }

    fn mark_programmed(&mut self, addr: u32) {
        if let Some(slot) = self.map.sectors.iter().position(|s| s.contains(addr)) {
            self.set_state(slot, SectorState::Programmed);
        }
    }

    fn set_state(&mut self, slot: usize, state: SectorState) {
        if let Some(tracked) = self.states.get_mut(slot) {
            *tracked = state;
        }
    }
}

fn program_fault(addr: u32, status: FlashStatus) -> crate::error::FlashFault {
    HardwareFault::ProgramIncomplete { addr, status }.into()
}

//! fwflash-sim - Simulated on-chip flash for testing
//!
//! This crate provides [`SimFlash`], an in-memory model of a sectored
//! on-chip flash that implements [`FlashPort`]. It follows the same rules as
//! the real part: programming can only clear bits, erase works on whole
//! sectors, the control register starts locked and error flags are sticky.
//!
//! Faults can be injected per sector or per address so that every failure
//! path of the controller can be exercised without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
mod error;
#[cfg(feature = "std")]
mod image;
#[cfg(test)]
mod scenarios;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use fwflash_core::layout::{FlashMap, ERASED_BYTE};
use fwflash_core::port::{FlashPort, FlashStatus};

#[cfg(feature = "std")]
pub use error::SimError;

/// Configuration for the simulated flash
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Flash layout to simulate
    pub map: FlashMap,
    /// Whether the control register starts locked
    pub start_locked: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map: FlashMap::STM32F4,
            start_locked: true,
        }
    }
}

/// Simulated flash
///
/// Emulates the flash array and its status register in memory.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone)]
pub struct SimFlash {
    config: SimConfig,
    data: Vec<u8>,
    locked: bool,
    status: FlashStatus,
    refuse_unlock: bool,
    failing_sectors: Vec<u8>,
    silent_erase_sectors: Vec<u8>,
    failing_program: Vec<u32>,
    stuck_bits: Vec<(u32, u8)>,
    erase_log: Vec<u8>,
    unlock_calls: usize,
    program_calls: usize,
}

#[cfg(feature = "alloc")]
impl SimFlash {
    /// Create a fully erased flash with the given configuration
    pub fn new(config: SimConfig) -> Self {
        let data = vec![ERASED_BYTE; config.map.size as usize];
        Self {
            locked: config.start_locked,
            config,
            data,
            status: FlashStatus::empty(),
            refuse_unlock: false,
            failing_sectors: Vec::new(),
            silent_erase_sectors: Vec::new(),
            failing_program: Vec::new(),
            stuck_bits: Vec::new(),
            erase_log: Vec::new(),
            unlock_calls: 0,
            program_calls: 0,
        }
    }

    /// Create a fully erased STM32F4 flash
    pub fn new_default() -> Self {
        Self::new(SimConfig::default())
    }

    /// Create a flash with pre-filled contents
    ///
    /// `initial` is copied from the flash base; anything beyond the flash
    /// size is ignored.
    pub fn with_data(config: SimConfig, initial: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial[..len]);
        flash
    }

    /// Get the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Get the flash map
    pub fn map(&self) -> &FlashMap {
        &self.config.map
    }

    /// Get the whole flash array
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash array, bypassing all rules
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get `len` bytes starting at bus address `addr`
    ///
    /// Returns `None` if the range is not inside the flash.
    pub fn slice(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let start = self.offset(addr)?;
        self.data.get(start..start.checked_add(len)?)
    }

    /// Sectors erased so far, in call order
    pub fn erase_log(&self) -> &[u8] {
        &self.erase_log
    }

    /// Number of unlock sequences issued
    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls
    }

    /// Number of program operations issued, byte and word
    pub fn program_calls(&self) -> usize {
        self.program_calls
    }

    /// Forget the erase log and call counters
    pub fn reset_counters(&mut self) {
        self.erase_log.clear();
        self.unlock_calls = 0;
        self.program_calls = 0;
    }

    /// Make the unlock sequence ineffective
    pub fn refuse_unlock(&mut self) {
        self.refuse_unlock = true;
    }

    /// Make erasing `sector` report an operation error without erasing
    pub fn fail_erase(&mut self, sector: u8) {
        self.failing_sectors.push(sector);
    }

    /// Make erasing `sector` report success without erasing
    pub fn skip_erase(&mut self, sector: u8) {
        self.silent_erase_sectors.push(sector);
    }

    /// Make any program operation touching `addr` report an error
    pub fn fail_program_at(&mut self, addr: u32) {
        self.failing_program.push(addr);
    }

    /// Hold the bits in `mask` at one for the byte at `addr`
    ///
    /// Programming appears to succeed but the bits never clear.
    pub fn stick_bits(&mut self, addr: u32, mask: u8) {
        self.stuck_bits.push((addr, mask));
    }

    /// Remove every injected fault
    pub fn clear_faults(&mut self) {
        self.refuse_unlock = false;
        self.failing_sectors.clear();
        self.silent_erase_sectors.clear();
        self.failing_program.clear();
        self.stuck_bits.clear();
    }

    /// Re-lock the control register, as a reset would
    pub fn lock(&mut self) {
        self.locked = true;
    }

    fn offset(&self, addr: u32) -> Option<usize> {
        let offset = addr.checked_sub(self.config.map.base)? as usize;
        (offset < self.data.len()).then_some(offset)
    }

    /// Common checks before a program or erase operation
    fn begin_operation(&mut self) -> bool {
        self.status.remove(FlashStatus::EOP);
        if self.locked {
            self.status |= FlashStatus::WRPERR;
            return false;
        }
        if self.status.intersects(FlashStatus::ERRORS) {
            // A previous error was never cleared
            self.status |= FlashStatus::PGSERR;
            return false;
        }
        true
    }

    fn program(&mut self, addr: u32, bytes: &[u8]) -> FlashStatus {
        self.program_calls += 1;
        if !self.begin_operation() {
            return self.status;
        }

        let end = addr.wrapping_add(bytes.len() as u32);
        if self.failing_program.iter().any(|&a| a >= addr && a < end) {
            log::debug!("sim: injected program failure at 0x{:08X}", addr);
            self.status |= FlashStatus::OPERR;
            return self.status;
        }

        let Some(start) = self
            .offset(addr)
            .filter(|&start| start + bytes.len() <= self.data.len())
        else {
            self.status |= FlashStatus::OPERR;
            return self.status;
        };

        // Programming can only change 1 -> 0
        for (i, &byte) in bytes.iter().enumerate() {
            let cell_addr = addr + i as u32;
            let stuck = self
                .stuck_bits
                .iter()
                .filter(|(a, _)| *a == cell_addr)
                .fold(0u8, |acc, (_, mask)| acc | mask);
            let cell = &mut self.data[start + i];
            *cell = (*cell & byte) | (*cell & stuck);
        }

        self.status |= FlashStatus::EOP;
        self.status
    }
}

#[cfg(feature = "alloc")]
impl FlashPort for SimFlash {
    fn unlock(&mut self) {
        self.unlock_calls += 1;
        if !self.refuse_unlock {
            self.locked = false;
        }
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn clear_status_flags(&mut self) {
        self.status = FlashStatus::empty();
    }

    fn erase_sector(&mut self, index: u8) -> FlashStatus {
        self.erase_log.push(index);
        if !self.begin_operation() {
            return self.status;
        }

        let Some(sector) = self.config.map.sector(index).copied() else {
            self.status |= FlashStatus::OPERR;
            return self.status;
        };

        if self.failing_sectors.contains(&index) {
            log::debug!("sim: injected erase failure on sector {}", index);
            self.status |= FlashStatus::OPERR;
            return self.status;
        }

        if !self.silent_erase_sectors.contains(&index) {
            let start = (sector.start - self.config.map.base) as usize;
            let end = start + sector.capacity as usize;
            if let Some(cells) = self.data.get_mut(start..end) {
                cells.fill(ERASED_BYTE);
            }
        }

        self.status |= FlashStatus::EOP;
        self.status
    }

    fn program_word(&mut self, addr: u32, value: u32) -> FlashStatus {
        if addr % 4 != 0 {
            self.program_calls += 1;
            self.status.remove(FlashStatus::EOP);
            self.status |= FlashStatus::PGAERR;
            return self.status;
        }
        self.program(addr, &value.to_le_bytes())
    }

    fn program_byte(&mut self, addr: u32, value: u8) -> FlashStatus {
        self.program(addr, &[value])
    }

    fn read_word(&self, addr: u32) -> u32 {
        let mut word = [ERASED_BYTE; 4];
        for (i, byte) in word.iter_mut().enumerate() {
            *byte = self.read_byte(addr.wrapping_add(i as u32));
        }
        u32::from_le_bytes(word)
    }

    fn read_byte(&self, addr: u32) -> u8 {
        self.offset(addr)
            .and_then(|offset| self.data.get(offset).copied())
            .unwrap_or(ERASED_BYTE)
    }
}

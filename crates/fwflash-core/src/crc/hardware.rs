//! CRC-32 on a word-oriented calculation unit
//!
//! The unit shifts MSB first while the reference algorithm is reflected. A
//! reflected register is the bit reverse of the MSB-first register fed with
//! bit-reversed input, so each word is reversed on the way in and the unit's
//! register is reversed once at the end. The trailing bytes the unit cannot
//! take are then shifted through the reflected register in software.

use super::{
    bit_reverse32, shift_reflected, Crc32Engine, CRC32_INIT, CRC32_POLY, CRC32_XOROUT,
};
use crate::port::CrcUnit;

/// CRC-32 computed by a [`CrcUnit`]
#[derive(Debug)]
pub struct HardwareCrc32<U: CrcUnit> {
    unit: U,
    register: u32,
}

impl<U: CrcUnit> HardwareCrc32<U> {
    /// Wrap a calculation unit
    pub fn new(unit: U) -> Self {
        Self {
            unit,
            register: CRC32_INIT,
        }
    }

    /// Get back the calculation unit
    pub fn into_inner(self) -> U {
        self.unit
    }
}

impl<U: CrcUnit> Crc32Engine for HardwareCrc32<U> {
    fn begin(&mut self) {
        self.unit.reset();
        self.register = CRC32_INIT;
    }

    fn feed_word(&mut self, word: u32) {
        self.register = self.unit.feed_word(bit_reverse32(word));
    }

    fn finish(&mut self, tail: &[u8]) -> u32 {
        let mut reflected = bit_reverse32(self.register);
        for &byte in tail {
            reflected = shift_reflected(reflected ^ byte as u32, 8);
        }
        reflected ^ CRC32_XOROUT
    }
}

/// Software model of an MSB-first CRC calculation unit
///
/// Behaves like the STM32 CRC peripheral; used where no such unit exists.
#[derive(Debug, Clone)]
pub struct SoftCrcUnit {
    data: u32,
}

impl SoftCrcUnit {
    /// Create a unit in its reset state
    pub const fn new() -> Self {
        Self { data: CRC32_INIT }
    }
}

impl Default for SoftCrcUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl CrcUnit for SoftCrcUnit {
    fn reset(&mut self) {
        self.data = CRC32_INIT;
    }

    fn feed_word(&mut self, word: u32) -> u32 {
        self.data ^= word;
        for _ in 0..32 {
            self.data = if self.data & 0x8000_0000 != 0 {
                (self.data << 1) ^ CRC32_POLY
            } else {
                self.data << 1
            };
        }
        self.data
    }
}

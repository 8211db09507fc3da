//! Bit-serial CRC-32

use super::{shift_reflected, Crc32Engine, CRC32_INIT, CRC32_XOROUT};

/// Pure software CRC-32, one bit per step
#[derive(Debug, Clone)]
pub struct SoftwareCrc32 {
    register: u32,
}

impl SoftwareCrc32 {
    /// Create an engine ready to accept data
    pub const fn new() -> Self {
        Self {
            register: CRC32_INIT,
        }
    }
}

impl Default for SoftwareCrc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32Engine for SoftwareCrc32 {
    fn begin(&mut self) {
        self.register = CRC32_INIT;
    }

    fn feed_word(&mut self, word: u32) {
        // Little-endian packing puts the first byte in the low bits, which
        // is where a reflected register consumes input first
        self.register = shift_reflected(self.register ^ word, 32);
    }

    fn finish(&mut self, tail: &[u8]) -> u32 {
        for &byte in tail {
            self.register = shift_reflected(self.register ^ byte as u32, 8);
        }
        self.register ^ CRC32_XOROUT
    }
}

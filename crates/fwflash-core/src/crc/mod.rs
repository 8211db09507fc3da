//! CRC-32 engine
//!
//! Produces the reflected CRC-32 (CRC-32/ISO-HDLC, the checksum used by zip
//! and most archive tools): reflected polynomial `0xEDB88320`, register
//! preset to all ones, final XOR with all ones.
//!
//! Two implementations share the [`Crc32Engine`] trait:
//!
//! - [`SoftwareCrc32`] - bit-serial, runs anywhere
//! - [`HardwareCrc32`] - feeds whole words to a [`CrcUnit`](crate::port::CrcUnit)
//!   and finishes the 0-3 trailing bytes in software
//!
//! Both produce identical results for every input.

mod hardware;
mod software;

pub use hardware::{HardwareCrc32, SoftCrcUnit};
pub use software::SoftwareCrc32;

/// Reflected CRC-32 polynomial
pub const CRC32_POLY_REFLECTED: u32 = 0xEDB8_8320;

/// CRC-32 polynomial in MSB-first form
pub const CRC32_POLY: u32 = 0x04C1_1DB7;

/// Register preset
pub const CRC32_INIT: u32 = 0xFFFF_FFFF;

/// Final XOR value
pub const CRC32_XOROUT: u32 = 0xFFFF_FFFF;

/// A streaming CRC-32 calculation
///
/// A calculation is `begin`, any number of `feed_word` calls with
/// little-endian words taken from the start of the data, then `finish` with
/// the remaining bytes.
pub trait Crc32Engine {
    /// Reset to the preset register value
    fn begin(&mut self);

    /// Consume four bytes, packed little-endian into a word
    fn feed_word(&mut self, word: u32);

    /// Consume the trailing bytes and return the checksum
    fn finish(&mut self, tail: &[u8]) -> u32;

    /// Checksum a whole buffer
    fn checksum(&mut self, data: &[u8]) -> u32 {
        self.begin();
        let mut words = data.chunks_exact(4);
        for word in &mut words {
            self.feed_word(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }
        self.finish(words.remainder())
    }
}

/// Compute the CRC-32 of a buffer in software
pub fn compute_crc32(data: &[u8]) -> u32 {
    SoftwareCrc32::new().checksum(data)
}

/// Reverse the bit order of a 32-bit word
pub const fn bit_reverse32(mut x: u32) -> u32 {
    x = ((x >> 1) & 0x5555_5555) | ((x & 0x5555_5555) << 1);
    x = ((x >> 2) & 0x3333_3333) | ((x & 0x3333_3333) << 2);
    x = ((x >> 4) & 0x0F0F_0F0F) | ((x & 0x0F0F_0F0F) << 4);
    x = ((x >> 8) & 0x00FF_00FF) | ((x & 0x00FF_00FF) << 8);
    (x >> 16) | (x << 16)
}

/// Shift `bits` bits out of a reflected register
#[inline]
pub(crate) fn shift_reflected(mut register: u32, bits: u32) -> u32 {
    for _ in 0..bits {
        let mask = if register & 1 != 0 { u32::MAX } else { 0 };
        register = (register >> 1) ^ (CRC32_POLY_REFLECTED & mask);
    }
    register
}

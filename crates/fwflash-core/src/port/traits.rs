//! Port trait definitions
//!
//! All port calls are blocking: an implementation busy-waits until the
//! hardware clears its busy flag and then reports the resulting status.

use bitflags::bitflags;

bitflags! {
    /// Flash status flags
    ///
    /// Bit positions follow the STM32F4 `FLASH_SR` register. Error flags are
    /// sticky until [`FlashPort::clear_status_flags`] is called.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlashStatus: u32 {
        /// End of operation
        const EOP    = 1 << 0;
        /// Operation error
        const OPERR  = 1 << 1;
        /// Write protection error
        const WRPERR = 1 << 4;
        /// Programming alignment error
        const PGAERR = 1 << 5;
        /// Programming parallelism error
        const PGPERR = 1 << 6;
        /// Programming sequence error
        const PGSERR = 1 << 7;
        /// Operation in progress
        const BSY    = 1 << 16;

        /// All error flags
        const ERRORS = Self::OPERR.bits()
            | Self::WRPERR.bits()
            | Self::PGAERR.bits()
            | Self::PGPERR.bits()
            | Self::PGSERR.bits();
    }
}

impl Default for FlashStatus {
    fn default() -> Self {
        FlashStatus::empty()
    }
}

impl FlashStatus {
    /// Whether the operation finished without any error flag
    pub fn completed(self) -> bool {
        self.contains(Self::EOP) && !self.intersects(Self::ERRORS | Self::BSY)
    }
}

/// Access to the flash interface
///
/// Addresses are absolute bus addresses. Programming can only clear bits;
/// only a sector erase sets them back to one.
pub trait FlashPort {
    /// Run the unlock key sequence on the flash control register
    fn unlock(&mut self);

    /// Whether the control register is locked against writes
    fn is_locked(&self) -> bool;

    /// Clear all sticky status flags
    fn clear_status_flags(&mut self);

    /// Erase one sector and wait for completion
    fn erase_sector(&mut self, index: u8) -> FlashStatus;

    /// Program one aligned 32-bit word and wait for completion
    fn program_word(&mut self, addr: u32, value: u32) -> FlashStatus;

    /// Program one byte and wait for completion
    fn program_byte(&mut self, addr: u32, value: u8) -> FlashStatus;

    /// Read one aligned 32-bit word
    fn read_word(&self, addr: u32) -> u32;

    /// Read one byte
    fn read_byte(&self, addr: u32) -> u8;
}

/// CRC calculation unit
///
/// Models a peripheral that shifts 32-bit words in MSB first using the
/// CRC-32 polynomial `0x04C11DB7`, with a reset value of all ones and no
/// reflection or final XOR. Each fed word returns the updated register.
pub trait CrcUnit {
    /// Reset the data register to all ones
    fn reset(&mut self);

    /// Feed one word and return the new register value
    fn feed_word(&mut self, word: u32) -> u32;
}

impl<U: CrcUnit + ?Sized> CrcUnit for &mut U {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn feed_word(&mut self, word: u32) -> u32 {
        (**self).feed_word(word)
    }
}

impl<P: FlashPort + ?Sized> FlashPort for &mut P {
    fn unlock(&mut self) {
        (**self).unlock()
    }

    fn is_locked(&self) -> bool {
        (**self).is_locked()
    }

    fn clear_status_flags(&mut self) {
        (**self).clear_status_flags()
    }

    fn erase_sector(&mut self, index: u8) -> FlashStatus {
        (**self).erase_sector(index)
    }

    fn program_word(&mut self, addr: u32, value: u32) -> FlashStatus {
        (**self).program_word(addr, value)
    }

    fn program_byte(&mut self, addr: u32, value: u8) -> FlashStatus {
        (**self).program_byte(addr, value)
    }

    fn read_word(&self, addr: u32) -> u32 {
        (**self).read_word(addr)
    }

    fn read_byte(&self, addr: u32) -> u8 {
        (**self).read_byte(addr)
    }
}

//! Result of a programming call

use crate::error::{FlashFault, Result};

/// What a programming call achieved
///
/// Returned instead of an error so that a failed write still reports how
/// many bytes were programmed and verified before the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct WriteOutcome {
    /// Bytes programmed and read back correctly, counted from the start
    pub bytes_written: u32,
    /// Whether the whole buffer was written
    pub succeeded: bool,
    /// First fault hit, if any
    pub fault: Option<FlashFault>,
}

impl WriteOutcome {
    /// Every byte written and verified
    pub const fn complete(bytes_written: u32) -> Self {
        Self {
            bytes_written,
            succeeded: true,
            fault: None,
        }
    }

    /// Stopped at `bytes_written` because of `fault`
    pub const fn failed(bytes_written: u32, fault: FlashFault) -> Self {
        Self {
            bytes_written,
            succeeded: false,
            fault: Some(fault),
        }
    }

    /// Convert into a `Result`, dropping the partial count on failure
    pub fn into_result(self) -> Result<u32> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.bytes_written),
        }
    }
}

//! Flash operations
//!
//! [`FlashController`] owns the hardware port and provides the erase,
//! program and read primitives the update session and metadata store are
//! built on.

mod controller;
mod outcome;

pub use controller::{FlashController, MAX_SECTORS};
pub use outcome::WriteOutcome;

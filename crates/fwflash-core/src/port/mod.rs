//! Hardware port abstractions
//!
//! The controller and CRC engine reach the hardware only through the traits
//! in this module, so the same logic runs against a memory-mapped flash
//! interface on the target and a simulated flash in tests.

mod traits;

pub use traits::*;

//! Flash layout
//!
//! Fixed description of the flash: the hardware sector table, where the
//! bootloader and application images live, and the addresses of the
//! integrity record and bootloader version fields.
//!
//! ```ignore
//! let map = FlashMap::STM32F4;
//! let app = map.region(ImageKind::Application);
//! println!("application at 0x{:08X}, up to {} bytes", app.start, app.max_size);
//! ```

mod stm32f4;
mod types;

pub use stm32f4::*;
pub use types::*;

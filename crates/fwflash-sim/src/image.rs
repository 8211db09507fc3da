//! Flash image files
//!
//! A simulated flash can be saved to and loaded from a raw binary file
//! holding the whole array, base address first. This lets a host tool run
//! several sessions against the same "device".

use std::fs;
use std::io;
use std::path::Path;

use crate::{SimConfig, SimError, SimFlash};

impl SimFlash {
    /// Load a flash image file
    ///
    /// The file must be exactly the configured flash size.
    pub fn load(config: SimConfig, path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let contents = fs::read(path)?;
        let expected = config.map.size as usize;
        if contents.len() != expected {
            return Err(SimError::SizeMismatch {
                path: path.to_path_buf(),
                expected,
                actual: contents.len(),
            });
        }

        log::debug!("loaded flash image from {}", path.display());
        Ok(Self::with_data(config, &contents))
    }

    /// Load a flash image file, or start from erased flash if it does not exist
    pub fn open_or_create(config: SimConfig, path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        match Self::load(config, path) {
            Err(SimError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("{} not found, starting from erased flash", path.display());
                Ok(Self::new(config))
            }
            other => other,
        }
    }

    /// Write the whole flash array to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let path = path.as_ref();
        fs::write(path, self.data())?;
        log::debug!("saved flash image to {}", path.display());
        Ok(())
    }
}

//! Error types for flash image files

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or saving a simulated flash image
#[derive(Debug, Error)]
pub enum SimError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Image file does not match the simulated flash size
    #[error(
        "flash image '{}' is {} bytes, expected {}",
        .path.display(),
        .actual,
        .expected
    )]
    SizeMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

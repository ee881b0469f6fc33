//! Error types shared across the PMS crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, PmsError>;

#[derive(Error, Debug)]
pub enum PmsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

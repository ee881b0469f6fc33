//! Error types for PMS ingestion
//!
//! Three scopes:
//!
//! - [`IngestError`]: the whole run failed; no statistics are produced
//! - [`FileError`]: one archive entry failed; the run counts it and continues
//! - [`UploadError`]: the upload was rejected before ingestion started

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::extract::ExtractError;
use crate::store::StoreError;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The bundle could not be opened or is not a zip archive
    #[error("Cannot open archive: {0}")]
    ArchiveOpen(#[source] ArchiveError),

    /// The per-run scratch directory could not be created
    #[error("Failed to create scratch directory under {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure of a single archive entry. The entry's writes are rolled back.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Invalid capture date '{date}': {source}")]
    InvalidDate {
        date: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Unpacking the entry or archiving the processed file failed
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Only .zip archives are accepted: '{0}'")]
    NotZip(String),

    #[error("Upload is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Cannot read upload '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

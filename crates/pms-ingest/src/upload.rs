//! Upload pre-check
//!
//! Bundles are rejected before ingestion if they are not `.zip` files or
//! exceed the configured size ceiling.

use std::path::Path;
use tracing::warn;

use crate::error::UploadError;

/// Check an uploaded bundle against the transport rules, returning its size
pub fn validate_upload(path: &Path, max_size: u64) -> Result<u64, UploadError> {
    let is_zip = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);
    if !is_zip {
        warn!(path = %path.display(), "Rejected upload: not a zip archive");
        return Err(UploadError::NotZip(path.display().to_string()));
    }

    let size = std::fs::metadata(path)
        .map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size > max_size {
        warn!(path = %path.display(), size, limit = max_size, "Rejected upload: too large");
        return Err(UploadError::TooLarge {
            size,
            limit: max_size,
        });
    }

    Ok(size)
}

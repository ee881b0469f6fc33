//! SHA-256 fingerprints for archived evidence

use crate::error::{PmsError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex-encoded SHA-256 of a file's contents
pub fn file_sha256(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    sha256(&mut file)
}

/// Hex-encoded SHA-256 of any readable source, streamed in 8 KiB blocks
pub fn sha256<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify that a file still matches a recorded digest
pub fn verify_file_sha256(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let actual = file_sha256(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(PmsError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

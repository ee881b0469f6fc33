//! PMS Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging setup and checksum helpers for the PMS
//! workspace.
//!
//! - **Error Handling**: [`PmsError`] and the crate-wide [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//! - **Checksums**: SHA-256 digests for archived evidence files
//!
//! # Example
//!
//! ```no_run
//! use pms_common::checksum::file_sha256;
//!
//! fn fingerprint(path: &str) -> pms_common::Result<()> {
//!     let digest = file_sha256(path)?;
//!     tracing::info!(%digest, "evidence fingerprint");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{PmsError, Result};

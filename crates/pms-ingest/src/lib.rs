//! PMS Ingest Library
//!
//! Ingests maintenance-evidence bundles collected from power-plant control
//! equipment. A bundle is a zip archive laid out as
//! `<category>/<equipment-group>/<asset>/<YYMMDD>_<file>`; each entry is
//! classified, its content extracted into maintenance detail rows, and the
//! rows stored under a per-asset, per-day, per-check-type log header.
//!
//! # Evidence kinds
//!
//! - **Performance dumps** (`disk,task/*.txt`): `Key: Value` metrics
//! - **Process snapshots** (`log,process/*.txt`): kept verbatim
//! - **Event logs** (`*.evtx`): severity statistics; the file itself is moved
//!   to archival storage and a header with critical events is marked failed
//!
//! # Example
//!
//! ```no_run
//! use pms_ingest::config::Config;
//! use pms_ingest::orchestrator::IngestOrchestrator;
//! use pms_ingest::store::PgStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = PgStore::new(config.database.connect().await?);
//!     let orchestrator = IngestOrchestrator::new(config.ingest, Arc::new(store));
//!
//!     let stats = orchestrator.ingest(Path::new("bundle.zip"), Some("kim")).await?;
//!     println!("{} processed, {} errors", stats.processed, stats.errors);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod upload;

pub use error::{FileError, IngestError, UploadError};
pub use orchestrator::{IngestOrchestrator, IngestStats};

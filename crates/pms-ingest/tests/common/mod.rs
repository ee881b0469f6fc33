//! Common test utilities for PMS ingestion integration tests
//!
//! Bundles are built in-test with `zip::ZipWriter`; each test gets its own
//! temporary upload and archive directories and an in-memory store.

#![allow(dead_code)]

pub mod event_log;

pub use event_log::EventLogBuilder;

use pms_ingest::config::IngestConfig;
use pms_ingest::store::{MaintenanceStore, MemoryStore};
use pms_ingest::IngestOrchestrator;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Builds a zip bundle entry by entry
#[derive(Default)]
pub struct BundleBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.entries.push((name.to_string(), content.as_ref().to_vec()));
        self
    }

    /// Directory entry; names must end with `/`
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), Vec::new()));
        self
    }

    pub fn write_to(&self, path: &Path) {
        let file = std::fs::File::create(path).expect("create bundle");
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in &self.entries {
            if name.ends_with('/') {
                writer
                    .add_directory(name.as_str(), SimpleFileOptions::default())
                    .expect("add directory");
            } else {
                writer
                    .start_file(name.as_str(), SimpleFileOptions::default())
                    .expect("start file");
                writer.write_all(content).expect("write entry");
            }
        }
        writer.finish().expect("finish bundle");
    }
}

/// Isolated filesystem layout plus an in-memory store
pub struct TestEnv {
    pub root: TempDir,
    pub store: MemoryStore,
    pub config: IngestConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create test root");
        let config = IngestConfig {
            upload_dir: root.path().join("uploads"),
            archive_dir: root.path().join("archive"),
            ..IngestConfig::default()
        };
        Self {
            root,
            store: MemoryStore::new(),
            config,
        }
    }

    pub fn orchestrator(&self) -> IngestOrchestrator {
        self.orchestrator_with(Arc::new(self.store.clone()))
    }

    pub fn orchestrator_with(&self, store: Arc<dyn MaintenanceStore>) -> IngestOrchestrator {
        IngestOrchestrator::new(self.config.clone(), store)
    }

    /// Write a bundle into the upload directory
    pub fn bundle(&self, name: &str, builder: BundleBuilder) -> PathBuf {
        std::fs::create_dir_all(&self.config.upload_dir).expect("create upload dir");
        let path = self.config.upload_dir.join(name);
        builder.write_to(&path);
        path
    }

    /// Entries left in the upload directory other than bundles
    pub fn scratch_leftovers(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.upload_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.extension().map(|ext| ext != "zip").unwrap_or(true))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Bytes that are not an EVTX file
pub const NOT_AN_EVENT_LOG: &[u8] = b"this is not an event log";

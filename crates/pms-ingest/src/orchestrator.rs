//! Ingestion orchestrator
//!
//! Drives one evidence bundle through classification, extraction, archival
//! and storage:
//!
//! ```text
//! open bundle ─▶ classify entries ─▶ for each descriptor:
//!                                      unpack ─▶ extract ─▶ stage (evtx)
//!                                      └▶ one unit of work: asset, header,
//!                                         status policy, evidence, details
//!                                      └▶ commit ─▶ publish staged evidence
//! ```
//!
//! Entries are independent. A failing entry is logged with its path, counted
//! in [`IngestStats::errors`] and leaves nothing behind in the store or the
//! archive directory; the run continues. Only an unreadable bundle aborts
//! the run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::archive::{stage_evidence, ArchiveReader, StagedEvidence};
use crate::classify::{classify_all, FileDescriptor};
use crate::config::IngestConfig;
use crate::error::{FileError, IngestError, Result};
use crate::extract::{event_log, Extraction, ExtractorKind};
use crate::models::{LogKey, NewDetail, NewEvidence};
use crate::store::MaintenanceStore;

/// Statistics for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Classified entries; unclassified entries are not counted anywhere
    pub total_files: usize,
    /// Entries whose unit of work committed
    pub processed: usize,
    /// Entries that failed and were rolled back
    pub errors: usize,
    /// Processed entries that produced no statistics (event-log support
    /// unavailable)
    pub degraded: usize,
    /// Distinct asset names that already existed
    pub assets_found: usize,
    /// Distinct asset names created by this run
    pub assets_created: usize,
    pub logs_created: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark stats as completed
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    fn record_success(&mut self, outcome: &FileOutcome, seen_assets: &mut HashSet<String>) {
        self.processed += 1;
        if outcome.degraded {
            self.degraded += 1;
        }
        if outcome.log_created {
            self.logs_created += 1;
        }
        if seen_assets.insert(outcome.asset_name.clone()) {
            if outcome.asset_created {
                self.assets_created += 1;
            } else {
                self.assets_found += 1;
            }
        }
    }
}

/// What a committed entry contributed
#[derive(Debug)]
struct FileOutcome {
    asset_name: String,
    asset_created: bool,
    log_created: bool,
    degraded: bool,
}

/// Blocking half of an entry: unpacked, extracted, staged if required
struct PreparedFile {
    extraction: Extraction,
    staged: Option<StagedEvidence>,
}

pub struct IngestOrchestrator {
    config: IngestConfig,
    store: Arc<dyn MaintenanceStore>,
}

impl IngestOrchestrator {
    pub fn new(config: IngestConfig, store: Arc<dyn MaintenanceStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one bundle, attributing newly created headers to `worker`
    #[tracing::instrument(skip(self), fields(archive = %archive_path.display()))]
    pub async fn ingest(&self, archive_path: &Path, worker: Option<&str>) -> Result<IngestStats> {
        let mut stats = IngestStats::new();

        let path = archive_path.to_path_buf();
        let reader = tokio::task::spawn_blocking(move || ArchiveReader::open(path))
            .await?
            .map_err(IngestError::ArchiveOpen)?;

        let descriptors = classify_all(reader.entries());
        stats.total_files = descriptors.len();
        info!(
            entries = reader.entries().len(),
            classified = descriptors.len(),
            "Classified archive entries"
        );

        let scratch = self.create_scratch_dir().await?;
        let mut seen_assets = HashSet::new();

        for descriptor in &descriptors {
            match self.process_file(&reader, descriptor, scratch.path(), worker).await {
                Ok(outcome) => stats.record_success(&outcome, &mut seen_assets),
                Err(e) => {
                    stats.errors += 1;
                    error!(path = %descriptor.file_path, error = %e, "Failed to process file");
                },
            }
        }

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
        }

        stats.complete();
        info!(
            total = stats.total_files,
            processed = stats.processed,
            errors = stats.errors,
            degraded = stats.degraded,
            assets_created = stats.assets_created,
            logs_created = stats.logs_created,
            duration_secs = stats.duration_secs,
            "Ingestion complete"
        );

        Ok(stats)
    }

    async fn create_scratch_dir(&self) -> Result<tempfile::TempDir> {
        let upload_dir = self.config.upload_dir.clone();
        let scratch_error = |source: std::io::Error| IngestError::Scratch {
            path: upload_dir.clone(),
            source,
        };

        tokio::fs::create_dir_all(&upload_dir)
            .await
            .map_err(scratch_error)?;
        tempfile::Builder::new()
            .prefix("extract_")
            .tempdir_in(&upload_dir)
            .map_err(scratch_error)
    }

    #[tracing::instrument(skip(self, reader, descriptor, scratch), fields(path = %descriptor.file_path))]
    async fn process_file(
        &self,
        reader: &ArchiveReader,
        descriptor: &FileDescriptor,
        scratch: &Path,
        worker: Option<&str>,
    ) -> std::result::Result<FileOutcome, FileError> {
        let check_date = descriptor
            .capture_date()
            .map_err(|source| FileError::InvalidDate {
                date: descriptor.date.clone(),
                source,
            })?;
        let extractor = ExtractorKind::select(descriptor.category, descriptor.kind());

        let PreparedFile { extraction, staged } =
            self.prepare_file(reader, descriptor, scratch, extractor).await?;
        let degraded = extraction.is_degraded();
        if let Extraction::Degraded { reason } = &extraction {
            warn!(path = %descriptor.file_path, reason = %reason, "No statistics extracted");
        }
        let fails_check =
            extractor == ExtractorKind::EventLog && has_critical_events(extraction.rows());
        let rows = extraction.into_rows();

        // On error the staged copy is dropped, which deletes it
        let outcome = self
            .record_file(descriptor, check_date, worker, fails_check, staged.as_ref(), &rows)
            .await?;

        if let Some(staged) = staged {
            tokio::task::spawn_blocking(move || staged.publish()).await??;
        }

        debug!(details = rows.len(), degraded, "File committed");
        Ok(FileOutcome {
            degraded,
            ..outcome
        })
    }

    /// One unit of work for an entry; rolled back unless it commits
    async fn record_file(
        &self,
        descriptor: &FileDescriptor,
        check_date: NaiveDate,
        worker: Option<&str>,
        fails_check: bool,
        staged: Option<&StagedEvidence>,
        rows: &[NewDetail],
    ) -> std::result::Result<FileOutcome, FileError> {
        let mut unit = self.store.begin().await?;

        let asset = unit.resolve_asset(&descriptor.asset_name).await?;
        let key = LogKey {
            asset_id: asset.get().id,
            check_date,
            check_type: descriptor.check_type(),
        };
        let log = unit.resolve_log(key, worker).await?;
        let log_id = log.get().id;

        if fails_check {
            debug!(%log_id, "Critical events present, marking check failed");
            unit.mark_log_failed(log_id).await?;
        }

        if let Some(staged) = staged {
            unit.insert_evidence(&NewEvidence {
                log_id,
                file_path: staged.target().display().to_string(),
                file_type: descriptor.kind().tag().to_string(),
                checksum: Some(staged.sha256().to_string()),
            })
            .await?;
        }

        for row in rows {
            unit.insert_detail(log_id, row).await?;
        }

        unit.commit().await?;

        Ok(FileOutcome {
            asset_name: descriptor.asset_name.clone(),
            asset_created: asset.was_created(),
            log_created: log.was_created(),
            degraded: false,
        })
    }

    /// Unpack, extract and stage off the async runtime
    async fn prepare_file(
        &self,
        reader: &ArchiveReader,
        descriptor: &FileDescriptor,
        scratch: &Path,
        extractor: ExtractorKind,
    ) -> std::result::Result<PreparedFile, FileError> {
        let reader = reader.clone();
        let entry_name = descriptor.file_path.clone();
        let scratch: PathBuf = scratch.to_path_buf();
        let archive_root = self.config.archive_dir.clone();
        let asset_name = descriptor.asset_name.clone();
        let archive_name = descriptor.archive_name();

        tokio::task::spawn_blocking(move || -> std::result::Result<PreparedFile, FileError> {
            let extracted = reader.extract_entry(&entry_name, &scratch)?;
            let extraction = extractor.extract(&extracted)?;

            let staged = if extractor.archives_evidence() {
                Some(stage_evidence(&extracted, &archive_root, &asset_name, &archive_name)?)
            } else {
                None
            };

            Ok(PreparedFile { extraction, staged })
        })
        .await?
    }
}

/// Whether any event-log payload reports critical-tier events
fn has_critical_events(rows: &[NewDetail]) -> bool {
    rows.iter()
        .filter_map(|row| row.raw_data.as_ref())
        .any(|raw| event_log::critical_count(raw) > 0)
}

/// List the classified entries of a bundle without touching storage
pub async fn scan(archive_path: &Path) -> Result<Vec<FileDescriptor>> {
    let path = archive_path.to_path_buf();
    let reader = tokio::task::spawn_blocking(move || ArchiveReader::open(path))
        .await?
        .map_err(IngestError::ArchiveOpen)?;
    Ok(classify_all(reader.entries()))
}

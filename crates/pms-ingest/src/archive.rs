//! Evidence bundle access and archival storage
//!
//! Two halves of the file plumbing around an ingestion run:
//!
//! - [`ArchiveReader`] lists and extracts entries of the uploaded zip bundle.
//!   Entries are unpacked one at a time into the run's scratch directory.
//! - [`stage_evidence`] moves a processed file into long-term storage at
//!   `<archive-root>/<asset-name>/<YYMMDD>_<filename>` and fingerprints it.
//!   The file stays under a pending name until the entry's unit of work
//!   commits and [`StagedEvidence::publish`] is called.
//!
//! Everything here is blocking; the orchestrator calls it through
//! `spawn_blocking`.

use pms_common::checksum;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("Failed to read archive entry {name}: {source}")]
    Entry {
        name: String,
        #[source]
        source: ZipError,
    },

    #[error("Refusing unsafe path {name}")]
    UnsafePath { name: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Fingerprint of {path} failed: {source}")]
    Checksum {
        path: PathBuf,
        #[source]
        source: pms_common::PmsError,
    },
}

impl ArchiveError {
    fn io(path: &Path, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read-only handle on an uploaded zip bundle
///
/// The central directory is read once by [`ArchiveReader::open`]; each
/// extraction reopens the file, so the handle is cheap to clone into
/// blocking tasks.
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    path: PathBuf,
    entries: Vec<String>,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let mut archive = open_zip(&path)?;

        // Listing order is the central directory order
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|source| ArchiveError::Open {
                path: path.clone(),
                source,
            })?;
            entries.push(entry.name().to_string());
        }

        debug!(path = %path.display(), entries = entries.len(), "Opened archive");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names as listed in the bundle, directories included
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Unpack one entry beneath `dest_dir`, keeping its relative path
    ///
    /// Entries whose name would resolve outside `dest_dir` are rejected.
    pub fn extract_entry(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, ArchiveError> {
        let mut archive = open_zip(&self.path)?;
        let mut entry = archive.by_name(name).map_err(|source| ArchiveError::Entry {
            name: name.to_string(),
            source,
        })?;

        let relative = entry
            .enclosed_name()
            .filter(|relative| !entry.is_dir() && relative.file_name().is_some())
            .ok_or_else(|| ArchiveError::UnsafePath {
                name: name.to_string(),
            })?;

        let target = dest_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }

        let mut out = File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
        let written = io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::io(&target, e))?;

        debug!(entry = name, bytes = written, "Extracted entry");
        Ok(target)
    }
}

fn open_zip(path: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::Open {
        path: path.to_path_buf(),
        source: ZipError::Io(e),
    })?;
    ZipArchive::new(file).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// A file placed in archival storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    pub path: PathBuf,
    pub sha256: String,
}

/// Evidence moved next to its final location but not yet visible there
///
/// The staged copy is a hidden `.<name>.*.pending` file in the asset
/// directory. [`StagedEvidence::publish`] renames it over the final name;
/// dropping it instead deletes the staged copy and leaves any previously
/// archived file untouched.
#[derive(Debug)]
pub struct StagedEvidence {
    staged: TempPath,
    target: PathBuf,
    sha256: String,
}

impl StagedEvidence {
    /// Where the file will live once published
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Rename the staged copy into place
    pub fn publish(self) -> Result<ArchivedFile, ArchiveError> {
        let StagedEvidence {
            staged,
            target,
            sha256,
        } = self;

        staged
            .persist(&target)
            .map_err(|e| ArchiveError::io(&target, e.error))?;

        debug!(path = %target.display(), sha256 = %sha256, "Archived evidence");
        Ok(ArchivedFile {
            path: target,
            sha256,
        })
    }
}

/// Stage `source` for `<archive_root>/<asset_name>/<archive_name>`
///
/// The source is moved into the asset directory under a pending name and
/// fingerprinted. Publishing replaces an existing file at the destination,
/// so re-ingesting a bundle converges on the same layout.
pub fn stage_evidence(
    source: &Path,
    archive_root: &Path,
    asset_name: &str,
    archive_name: &str,
) -> Result<StagedEvidence, ArchiveError> {
    let asset_dir = archive_root.join(single_component(asset_name)?);
    let target = asset_dir.join(single_component(archive_name)?);

    let sha256 = checksum::file_sha256(source).map_err(|e| ArchiveError::Checksum {
        path: source.to_path_buf(),
        source: e,
    })?;

    fs::create_dir_all(&asset_dir).map_err(|e| ArchiveError::io(&asset_dir, e))?;
    let staged = tempfile::Builder::new()
        .prefix(&format!(".{}.", archive_name))
        .suffix(".pending")
        .tempfile_in(&asset_dir)
        .map_err(|e| ArchiveError::io(&asset_dir, e))?
        .into_temp_path();
    move_file(source, &staged)?;

    // The move may have been a copy across filesystems
    checksum::verify_file_sha256(&staged, &sha256).map_err(|e| ArchiveError::Checksum {
        path: staged.to_path_buf(),
        source: e,
    })?;

    debug!(path = %staged.display(), target = %target.display(), "Staged evidence");
    Ok(StagedEvidence {
        staged,
        target,
        sha256,
    })
}

/// Rename, falling back to copy + remove when crossing filesystems
fn move_file(source: &Path, target: &Path) -> Result<(), ArchiveError> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    fs::copy(source, target).map_err(|e| ArchiveError::io(target, e))?;
    fs::remove_file(source).map_err(|e| ArchiveError::io(source, e))?;
    Ok(())
}

/// Accept a name only if it is exactly one normal path component
fn single_component(name: &str) -> Result<&str, ArchiveError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) if !name.contains('\\') => Ok(name),
        _ => Err(ArchiveError::UnsafePath {
            name: name.to_string(),
        }),
    }
}

//! Content extractors
//!
//! One extractor per evidence kind:
//!
//! - **performance**: `Key: Value` lines from `disk,task` text dumps
//! - **snapshot**: whole-file capture of `log,process` text snapshots
//! - **event_log**: severity / event-code statistics from `.evtx` exports
//!
//! Extractors never swallow failures. They return [`Extraction`] on success
//! (possibly degraded, e.g. when EVTX support is compiled out) and
//! [`ExtractError`] when the file itself cannot be read.

pub mod event_log;
pub mod performance;
pub mod snapshot;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classify::{FileKind, WorkCategory};
use crate::models::NewDetail;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable event log {path}: {message}")]
    EventLog { path: PathBuf, message: String },
}

impl ExtractError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What an extractor produced for one file
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Rows(Vec<NewDetail>),
    /// The file was accepted but could not be analysed; no rows
    Degraded { reason: String },
}

impl Extraction {
    pub fn rows(&self) -> &[NewDetail] {
        match self {
            Extraction::Rows(rows) => rows,
            Extraction::Degraded { .. } => &[],
        }
    }

    pub fn into_rows(self) -> Vec<NewDetail> {
        match self {
            Extraction::Rows(rows) => rows,
            Extraction::Degraded { .. } => Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Extraction::Degraded { .. })
    }
}

/// Which extractor handles an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    Performance,
    Snapshot,
    EventLog,
    /// No extractor; the entry is still counted as processed
    Unsupported,
}

impl ExtractorKind {
    pub fn select(category: WorkCategory, kind: FileKind) -> Self {
        match (category, kind) {
            (WorkCategory::Performance, FileKind::Text) => ExtractorKind::Performance,
            (WorkCategory::Process, FileKind::Text) => ExtractorKind::Snapshot,
            (_, FileKind::EventLog) => ExtractorKind::EventLog,
            (_, FileKind::Other) => ExtractorKind::Unsupported,
        }
    }

    /// Whether processed files of this kind are moved to archival storage
    pub fn archives_evidence(self) -> bool {
        matches!(self, ExtractorKind::EventLog)
    }

    /// Run the extractor against an extracted file. Blocking.
    pub fn extract(self, path: &Path) -> Result<Extraction, ExtractError> {
        match self {
            ExtractorKind::Performance => performance::extract(path),
            ExtractorKind::Snapshot => snapshot::extract(path),
            ExtractorKind::EventLog => event_log::extract(path),
            ExtractorKind::Unsupported => Ok(Extraction::Rows(Vec::new())),
        }
    }
}

/// Read a file as text, dropping byte sequences that are not valid UTF-8
pub(crate) fn read_text_lossy(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::io(path, e))?;
    Ok(decode_dropping_invalid(&bytes))
}

pub(crate) fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Lines terminated by `\r\n`, `\n` or a lone `\r`
///
/// A final terminator does not open an empty trailing line, matching
/// [`str::lines`].
pub(crate) fn text_lines(content: &str) -> impl Iterator<Item = &str> {
    let mut rest = content;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(|c: char| c == '\r' || c == '\n') {
            Some(end) => {
                let line = &rest[..end];
                let terminator = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[end + terminator..];
                Some(line)
            },
            None => {
                let line = rest;
                rest = "";
                Some(line)
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_extractor() {
        use ExtractorKind::*;
        assert_eq!(ExtractorKind::select(WorkCategory::Performance, FileKind::Text), Performance);
        assert_eq!(ExtractorKind::select(WorkCategory::Process, FileKind::Text), Snapshot);
        assert_eq!(ExtractorKind::select(WorkCategory::Process, FileKind::EventLog), EventLog);
        assert_eq!(ExtractorKind::select(WorkCategory::Performance, FileKind::EventLog), EventLog);
        assert_eq!(ExtractorKind::select(WorkCategory::Process, FileKind::Other), Unsupported);
    }

    #[test]
    fn test_only_event_logs_are_archived() {
        assert!(ExtractorKind::EventLog.archives_evidence());
        assert!(!ExtractorKind::Performance.archives_evidence());
        assert!(!ExtractorKind::Snapshot.archives_evidence());
        assert!(!ExtractorKind::Unsupported.archives_evidence());
    }

    #[test]
    fn test_text_lines_accepts_every_line_ending() {
        let lines: Vec<_> = text_lines("a\r\nb\nc\rd").collect();
        assert_eq!(lines, vec!["a", "b", "c", "d"]);

        assert_eq!(text_lines("a\r\rb\r").collect::<Vec<_>>(), vec!["a", "", "b"]);
        assert_eq!(text_lines("").count(), 0);
        assert_eq!(text_lines("\n").collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        let bytes = b"CPU\xff: 4\xc3\x282%";
        assert_eq!(decode_dropping_invalid(bytes), "CPU: 4(2%");
    }

    #[test]
    fn test_unsupported_yields_no_rows() {
        let extraction = ExtractorKind::Unsupported
            .extract(Path::new("/nonexistent/file.conf"))
            .unwrap();
        assert!(extraction.rows().is_empty());
        assert!(!extraction.is_degraded());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ExtractorKind::Performance.extract(Path::new("/nonexistent/cpu.txt"));
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }
}

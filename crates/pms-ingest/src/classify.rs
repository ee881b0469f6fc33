//! Archive entry path classification
//!
//! Evidence bundles follow a fixed layout:
//!
//! ```text
//! <category-token>/<equipment-group>/<asset-name>/<YYMMDD>_<filename>.<ext>
//! disk,task/1단계_ECMS/1BL_ECMS_EWS1/251209_cpu.txt
//! log,process/1단계_ECMS/1BL_ECMS_EWS1/251209_System.evtx
//! ```
//!
//! The comma is part of the category token. Entries that do not fit the
//! layout (directories, stray files) are not errors; [`classify`] returns
//! `None` and the orchestrator skips them.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::CheckType;

/// Category token for performance dumps
pub const PERFORMANCE_TOKEN: &str = "disk,task";

/// Category token for process snapshots and event-log exports
pub const PROCESS_TOKEN: &str = "log,process";

const DATE_DIGITS: usize = 6;
const MIN_SEGMENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkCategory {
    /// `disk,task`
    Performance,
    /// `log,process`
    Process,
}

impl WorkCategory {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            PERFORMANCE_TOKEN => Some(WorkCategory::Performance),
            PROCESS_TOKEN => Some(WorkCategory::Process),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            WorkCategory::Performance => PERFORMANCE_TOKEN,
            WorkCategory::Process => PROCESS_TOKEN,
        }
    }
}

/// File kind, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileKind {
    Text,
    EventLog,
    Other,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "txt" => FileKind::Text,
            "evtx" => FileKind::EventLog,
            _ => FileKind::Other,
        }
    }

    /// Tag recorded on evidence rows
    pub fn tag(self) -> &'static str {
        match self {
            FileKind::Text => "txt",
            FileKind::EventLog => "evtx",
            FileKind::Other => "other",
        }
    }
}

/// Header check type for a (category, extension) pair
///
/// | category    | extension | check type |
/// |-------------|-----------|------------|
/// | Performance | any       | Disk       |
/// | Process     | `txt`     | Process    |
/// | Process     | other     | Log        |
pub fn check_type_for(category: WorkCategory, extension: &str) -> CheckType {
    match category {
        WorkCategory::Performance => CheckType::Disk,
        WorkCategory::Process if extension == "txt" => CheckType::Process,
        WorkCategory::Process => CheckType::Log,
    }
}

/// A classified archive entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub category: WorkCategory,
    pub equipment_group: String,
    pub asset_name: String,
    /// Six ASCII digits, `YYMMDD`
    pub date: String,
    /// Final segment with the `YYMMDD_` prefix stripped
    pub filename: String,
    /// Archive-relative path, exactly as listed in the bundle
    pub file_path: String,
    /// Lowercased, without the dot; empty when the filename has none
    pub extension: String,
}

impl FileDescriptor {
    pub fn kind(&self) -> FileKind {
        FileKind::from_extension(&self.extension)
    }

    pub fn check_type(&self) -> CheckType {
        check_type_for(self.category, &self.extension)
    }

    /// Calendar date of the capture, assuming the 2000s.
    ///
    /// The classifier only checks that the prefix is six digits, so this is
    /// where impossible dates such as month 13 surface.
    pub fn capture_date(&self) -> Result<NaiveDate, chrono::ParseError> {
        NaiveDate::parse_from_str(&format!("20{}", self.date), "%Y%m%d")
    }

    /// Name under which the file is archived: `YYMMDD_<filename>`
    pub fn archive_name(&self) -> String {
        format!("{}_{}", self.date, self.filename)
    }
}

/// Classify one archive entry path
pub fn classify(path: &str) -> Option<FileDescriptor> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < MIN_SEGMENTS {
        return None;
    }

    let category = WorkCategory::from_token(segments[0])?;
    let last = segments[segments.len() - 1];
    let (date, filename) = split_date_prefix(last)?;

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    Some(FileDescriptor {
        category,
        equipment_group: segments[1].to_string(),
        asset_name: segments[2].to_string(),
        date: date.to_string(),
        filename: filename.to_string(),
        file_path: path.to_string(),
        extension,
    })
}

/// Classify a listing, keeping only conforming entries in listing order
pub fn classify_all<I, S>(paths: I) -> Vec<FileDescriptor>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .filter_map(|path| classify(path.as_ref()))
        .collect()
}

/// Split `YYMMDD_rest` into (`YYMMDD`, `rest`)
fn split_date_prefix(segment: &str) -> Option<(&str, &str)> {
    let bytes = segment.as_bytes();
    if bytes.len() <= DATE_DIGITS
        || !bytes[..DATE_DIGITS].iter().all(u8::is_ascii_digit)
        || bytes[DATE_DIGITS] != b'_'
    {
        return None;
    }
    // The first seven bytes are ASCII, so both split points are char boundaries.
    Some((&segment[..DATE_DIGITS], &segment[DATE_DIGITS + 1..]))
}

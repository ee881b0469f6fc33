//! Windows event-log statistics
//!
//! Each `.evtx` record is rendered as an XML envelope; only two fields of its
//! `System` block matter here:
//!
//! ```xml
//! <Event xmlns="http://schemas.microsoft.com/win/2004/08/events/event">
//!   <System>
//!     <EventID Qualifiers="49152">7000</EventID>
//!     <Level>2</Level>
//!     ...
//!   </System>
//! </Event>
//! ```
//!
//! Records are tallied into a severity table keyed `level_1` (critical),
//! `level_2` (error) and `level_3` (warning), then by `EventID_<code>`. Every
//! record counts toward the total. Records outside levels 1-3 (information,
//! verbose) and records whose envelope cannot be read count as level 0 and
//! are not bucketed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::{ExtractError, Extraction};
use crate::models::NewDetail;

/// Key of the critical tier in the serialized table
pub const CRITICAL_TIER: &str = "level_1";

/// Severity-tier frequency table, serialized as the detail payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTable {
    pub level_1: BTreeMap<String, u64>,
    pub level_2: BTreeMap<String, u64>,
    pub level_3: BTreeMap<String, u64>,
}

impl SeverityTable {
    fn tier_mut(&mut self, severity: u32) -> Option<&mut BTreeMap<String, u64>> {
        match severity {
            1 => Some(&mut self.level_1),
            2 => Some(&mut self.level_2),
            3 => Some(&mut self.level_3),
            _ => None,
        }
    }

    pub fn critical_total(&self) -> u64 {
        self.level_1.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    pub total: u64,
    pub table: SeverityTable,
}

impl EventStats {
    pub fn record(&mut self, severity: u32, event_id: u32) {
        self.total += 1;
        if let Some(tier) = self.table.tier_mut(severity) {
            *tier.entry(format!("EventID_{}", event_id)).or_insert(0) += 1;
        }
    }

    pub fn record_envelope(&mut self, xml: &str) {
        let (severity, event_id) = parse_envelope(xml);
        self.record(severity, event_id);
    }

    pub fn from_envelopes<I, S>(envelopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = Self::default();
        for envelope in envelopes {
            stats.record_envelope(envelope.as_ref());
        }
        stats
    }

    pub fn into_detail(self, source: SourceTag) -> NewDetail {
        NewDetail {
            item_name: format!("{} Event Stats", source.as_str()),
            value: Some(self.total.to_string()),
            raw_data: serde_json::to_value(self.table).ok(),
        }
    }
}

/// Which Windows log a file came from, guessed from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTag {
    Sys,
    App,
    Sec,
    Unknown,
}

impl SourceTag {
    /// First match wins: `sys`, then `app`, then `sec`, case-insensitive
    pub fn from_stem(stem: &str) -> Self {
        let stem = stem.to_lowercase();
        if stem.contains("sys") {
            SourceTag::Sys
        } else if stem.contains("app") {
            SourceTag::App
        } else if stem.contains("sec") {
            SourceTag::Sec
        } else {
            SourceTag::Unknown
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.file_stem()
            .map(|stem| Self::from_stem(&stem.to_string_lossy()))
            .unwrap_or(SourceTag::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Sys => "sys",
            SourceTag::App => "app",
            SourceTag::Sec => "sec",
            SourceTag::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "System")]
    system: Option<SystemSection>,
}

#[derive(Debug, Deserialize)]
struct SystemSection {
    #[serde(rename = "EventID")]
    event_id: Option<TextField>,
    #[serde(rename = "Level")]
    level: Option<TextField>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "$text", default)]
    value: String,
}

/// `(severity, event_id)` of one record envelope; `(0, 0)` if unreadable
pub fn parse_envelope(xml: &str) -> (u32, u32) {
    match try_parse_envelope(xml) {
        Some(parsed) => parsed,
        None => {
            debug!("Unreadable event envelope, counting as level 0");
            (0, 0)
        },
    }
}

fn try_parse_envelope(xml: &str) -> Option<(u32, u32)> {
    let envelope: EventEnvelope = quick_xml::de::from_str(xml).ok()?;
    let system = envelope.system?;
    let level = parse_field(system.level.as_ref())?;
    let event_id = parse_field(system.event_id.as_ref())?;
    Some((level, event_id))
}

/// Missing element reads as 0, a present but non-numeric one fails the record
fn parse_field(field: Option<&TextField>) -> Option<u32> {
    match field {
        None => Some(0),
        Some(field) if field.value.trim().is_empty() => Some(0),
        Some(field) => field.value.trim().parse().ok(),
    }
}

/// Sum of the critical tier in a serialized [`SeverityTable`]
pub fn critical_count(raw: &serde_json::Value) -> u64 {
    raw.get(CRITICAL_TIER)
        .and_then(|tier| tier.as_object())
        .map(|tier| tier.values().filter_map(|count| count.as_u64()).sum())
        .unwrap_or(0)
}

/// Extract statistics from an `.evtx` file. Blocking.
pub fn extract(path: &Path) -> Result<Extraction, ExtractError> {
    let source = SourceTag::from_path(path);
    match read_stats(path)? {
        Some(stats) => {
            debug!(
                path = %path.display(),
                total = stats.total,
                critical = stats.table.critical_total(),
                "Event log tallied"
            );
            Ok(Extraction::Rows(vec![stats.into_detail(source)]))
        },
        None => Ok(Extraction::Degraded {
            reason: "built without event-log support (feature `evtx`)".to_string(),
        }),
    }
}

#[cfg(feature = "evtx")]
fn read_stats(path: &Path) -> Result<Option<EventStats>, ExtractError> {
    let mut parser = evtx::EvtxParser::from_path(path).map_err(|e| ExtractError::EventLog {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut stats = EventStats::default();
    for record in parser.records() {
        match record {
            Ok(record) => stats.record_envelope(&record.data),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Undecodable event record");
                stats.record(0, 0);
            },
        }
    }

    Ok(Some(stats))
}

#[cfg(not(feature = "evtx"))]
fn read_stats(path: &Path) -> Result<Option<EventStats>, ExtractError> {
    if !path.is_file() {
        return Err(ExtractError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "event log not found"),
        ));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(level: &str, event_id: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<Event xmlns="http://schemas.microsoft.com/win/2004/08/events/event">
  <System>
    <Provider Name="Service Control Manager" Guid="{{555908d1-a6d7-4695-8e1e-26931d2012f4}}"></Provider>
    <EventID Qualifiers="49152">{event_id}</EventID>
    <Version>0</Version>
    <Level>{level}</Level>
    <Task>0</Task>
    <TimeCreated SystemTime="2025-01-15T09:30:00.000000Z"></TimeCreated>
    <Computer>EWS1</Computer>
  </System>
  <EventData><Data Name="param1">Spooler</Data></EventData>
</Event>"#
        )
    }

    #[test]
    fn test_parse_envelope() {
        assert_eq!(parse_envelope(&envelope("2", "7000")), (2, 7000));
        assert_eq!(parse_envelope(&envelope("4", "7036")), (4, 7036));
    }

    #[test]
    fn test_malformed_envelope_is_level_zero() {
        assert_eq!(parse_envelope("<Event><System><Level>1"), (0, 0));
        assert_eq!(parse_envelope("not xml at all"), (0, 0));
        assert_eq!(parse_envelope(&envelope("high", "41")), (0, 0));
    }

    #[test]
    fn test_severity_outside_tiers_counts_only_toward_total() {
        let stats = EventStats::from_envelopes([envelope("1", "41"), envelope("4", "7036")]);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.table.critical_total(), 1);
        assert_eq!(stats.table.level_1.get("EventID_41"), Some(&1));
        assert!(stats.table.level_2.is_empty());
        assert!(stats.table.level_3.is_empty());
    }

    #[test]
    fn test_tiers_count_per_event_code() {
        let stats = EventStats::from_envelopes([
            envelope("2", "7000"),
            envelope("2", "7000"),
            envelope("2", "7009"),
            envelope("3", "1014"),
            "garbage".to_string(),
        ]);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.table.level_2.get("EventID_7000"), Some(&2));
        assert_eq!(stats.table.level_2.get("EventID_7009"), Some(&1));
        assert_eq!(stats.table.level_3.get("EventID_1014"), Some(&1));
        assert_eq!(stats.table.critical_total(), 0);
    }

    #[test]
    fn test_into_detail_payload_shape() {
        let mut stats = EventStats::default();
        stats.record(1, 41);
        stats.record(1, 41);
        stats.record(3, 10016);

        let detail = stats.into_detail(SourceTag::Sys);
        assert_eq!(detail.item_name, "sys Event Stats");
        assert_eq!(detail.value.as_deref(), Some("3"));

        let raw = detail.raw_data.unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "level_1": { "EventID_41": 2 },
                "level_2": {},
                "level_3": { "EventID_10016": 1 },
            })
        );
        assert_eq!(critical_count(&raw), 2);
    }

    #[test]
    fn test_critical_count_tolerates_other_shapes() {
        assert_eq!(critical_count(&serde_json::json!({})), 0);
        assert_eq!(critical_count(&serde_json::json!("text payload")), 0);
        assert_eq!(critical_count(&serde_json::json!({ "level_1": { "EventID_1": 0 } })), 0);
    }

    #[test]
    fn test_source_tag_from_stem() {
        assert_eq!(SourceTag::from_stem("250115_System"), SourceTag::Sys);
        assert_eq!(SourceTag::from_stem("Application"), SourceTag::App);
        assert_eq!(SourceTag::from_stem("SECURITY"), SourceTag::Sec);
        assert_eq!(SourceTag::from_stem("setup"), SourceTag::Unknown);
        // first match wins
        assert_eq!(SourceTag::from_stem("app_sys_sec"), SourceTag::Sys);
        assert_eq!(
            SourceTag::from_path(Path::new("/tmp/x/250115_Application.evtx")),
            SourceTag::App
        );
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("250115_System.evtx");
        assert!(extract(&path).is_err());
    }

    #[cfg(feature = "evtx")]
    #[test]
    fn test_non_evtx_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("250115_System.evtx");
        std::fs::write(&path, b"this is not an event log").unwrap();
        assert!(matches!(extract(&path), Err(ExtractError::EventLog { .. })));
    }

    #[cfg(not(feature = "evtx"))]
    #[test]
    fn test_without_support_extraction_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("250115_System.evtx");
        std::fs::write(&path, b"ElfFile\0").unwrap();
        assert!(extract(&path).unwrap().is_degraded());
    }
}

//! Maintenance record models
//!
//! Rows as they live in the store. Enum columns are stored as lowercase text
//! (`CHECK` constrained in the schema) and round-trip through `as_str` /
//! `FromStr`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operational state of a field asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Operational,
    Maintenance,
    Faulty,
}

impl AssetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetStatus::Operational => "operational",
            AssetStatus::Maintenance => "maintenance",
            AssetStatus::Faulty => "faulty",
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "operational" => Ok(AssetStatus::Operational),
            "maintenance" => Ok(AssetStatus::Maintenance),
            "faulty" => Ok(AssetStatus::Faulty),
            _ => Err(anyhow::anyhow!("Invalid asset status: {}", s)),
        }
    }
}

/// Kind of inspection a maintenance log header records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Disk,
    Process,
    Log,
    Other,
}

impl CheckType {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckType::Disk => "disk",
            CheckType::Process => "process",
            CheckType::Log => "log",
            CheckType::Other => "other",
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disk" => Ok(CheckType::Disk),
            "process" => Ok(CheckType::Process),
            "log" => Ok(CheckType::Log),
            "other" => Ok(CheckType::Other),
            _ => Err(anyhow::anyhow!("Invalid check type: {}", s)),
        }
    }
}

/// Outcome of a maintenance check. Ingestion only ever moves `Pass` to `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Pass,
    Fail,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Pass => "pass",
            ResultStatus::Fail => "fail",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(ResultStatus::Pass),
            "fail" => Ok(ResultStatus::Fail),
            _ => Err(anyhow::anyhow!("Invalid result status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub name: String,
    pub status: AssetStatus,
}

/// Maintenance log header, unique by (asset, check date, check type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceLog {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub check_date: NaiveDate,
    pub check_type: CheckType,
    pub worker: Option<String>,
    pub result_status: ResultStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceDetail {
    pub id: Uuid,
    pub log_id: Uuid,
    pub item_name: String,
    pub value: Option<String>,
    pub raw_data: Option<serde_json::Value>,
}

/// Archived copy of a processed source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub id: Uuid,
    pub log_id: Uuid,
    pub file_path: String,
    pub file_type: String,
    pub checksum: Option<String>,
}

/// Natural key of a maintenance log header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub asset_id: Uuid,
    pub check_date: NaiveDate,
    pub check_type: CheckType,
}

/// A detail row ready to be written under a header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDetail {
    pub item_name: String,
    pub value: Option<String>,
    pub raw_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvidence {
    pub log_id: Uuid,
    pub file_path: String,
    pub file_type: String,
    pub checksum: Option<String>,
}

/// Result of a resolve-or-create lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Found(T),
    Created(T),
}

impl<T> Resolved<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Resolved::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Resolved::Found(value) | Resolved::Created(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Resolved::Found(value) | Resolved::Created(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_round_trip() {
        for check_type in [CheckType::Disk, CheckType::Process, CheckType::Log, CheckType::Other] {
            assert_eq!(check_type.as_str().parse::<CheckType>().unwrap(), check_type);
        }
        assert_eq!("FAIL".parse::<ResultStatus>().unwrap(), ResultStatus::Fail);
        assert!("unknown".parse::<AssetStatus>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(AssetStatus::default(), AssetStatus::Operational);
        assert_eq!(ResultStatus::default(), ResultStatus::Pass);
    }

    #[test]
    fn test_resolved_accessors() {
        let created = Resolved::Created(7);
        assert!(created.was_created());
        assert_eq!(*created.get(), 7);

        let found = Resolved::Found("asset");
        assert!(!found.was_created());
        assert_eq!(found.into_inner(), "asset");
    }
}

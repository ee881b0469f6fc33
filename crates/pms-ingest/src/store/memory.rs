//! In-process maintenance store
//!
//! Backs `--dry-run` ingestions and the test suite. A unit of work holds the
//! store lock for its whole lifetime and writes against a private copy of the
//! state, which replaces the shared state on commit. Units are therefore
//! serialized, and an uncommitted unit leaves no trace.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{MaintenanceStore, StoreError, StoreResult, UnitOfWork};
use crate::models::{
    Asset, AssetStatus, EvidenceFile, LogKey, MaintenanceDetail, MaintenanceLog, NewDetail,
    NewEvidence, Resolved, ResultStatus,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    assets: Vec<Asset>,
    logs: Vec<MaintenanceLog>,
    details: Vec<MaintenanceDetail>,
    evidence: Vec<EvidenceFile>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assets(&self) -> Vec<Asset> {
        self.state.lock().await.assets.clone()
    }

    pub async fn logs(&self) -> Vec<MaintenanceLog> {
        self.state.lock().await.logs.clone()
    }

    /// All detail rows, in insertion order
    pub async fn details(&self) -> Vec<MaintenanceDetail> {
        self.state.lock().await.details.clone()
    }

    pub async fn evidence(&self) -> Vec<EvidenceFile> {
        self.state.lock().await.evidence.clone()
    }
}

#[async_trait]
impl MaintenanceStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard: Some(guard),
            working,
        }))
    }
}

pub struct MemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryUnitOfWork {
    fn state(&mut self) -> StoreResult<&mut MemoryState> {
        if self.guard.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn resolve_asset(&mut self, name: &str) -> StoreResult<Resolved<Asset>> {
        let state = self.state()?;

        if let Some(asset) = state.assets.iter().find(|asset| asset.name == name) {
            return Ok(Resolved::Found(asset.clone()));
        }

        let asset = Asset {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: AssetStatus::default(),
        };
        state.assets.push(asset.clone());
        Ok(Resolved::Created(asset))
    }

    async fn resolve_log(
        &mut self,
        key: LogKey,
        worker: Option<&str>,
    ) -> StoreResult<Resolved<MaintenanceLog>> {
        let state = self.state()?;

        let existing = state.logs.iter().find(|log| {
            log.asset_id == key.asset_id
                && log.check_date == key.check_date
                && log.check_type == key.check_type
        });
        if let Some(log) = existing {
            return Ok(Resolved::Found(log.clone()));
        }

        let log = MaintenanceLog {
            id: Uuid::new_v4(),
            asset_id: key.asset_id,
            check_date: key.check_date,
            check_type: key.check_type,
            worker: worker.map(str::to_string),
            result_status: ResultStatus::default(),
        };
        state.logs.push(log.clone());
        Ok(Resolved::Created(log))
    }

    async fn mark_log_failed(&mut self, log_id: Uuid) -> StoreResult<()> {
        let state = self.state()?;
        let log = state
            .logs
            .iter_mut()
            .find(|log| log.id == log_id)
            .ok_or(StoreError::LogNotFound(log_id))?;
        log.result_status = ResultStatus::Fail;
        Ok(())
    }

    async fn insert_detail(&mut self, log_id: Uuid, detail: &NewDetail) -> StoreResult<Uuid> {
        let state = self.state()?;
        if !state.logs.iter().any(|log| log.id == log_id) {
            return Err(StoreError::LogNotFound(log_id));
        }

        let id = Uuid::new_v4();
        state.details.push(MaintenanceDetail {
            id,
            log_id,
            item_name: detail.item_name.clone(),
            value: detail.value.clone(),
            raw_data: detail.raw_data.clone(),
        });
        Ok(id)
    }

    async fn insert_evidence(&mut self, evidence: &NewEvidence) -> StoreResult<()> {
        let state = self.state()?;
        if !state.logs.iter().any(|log| log.id == evidence.log_id) {
            return Err(StoreError::LogNotFound(evidence.log_id));
        }

        let existing = state
            .evidence
            .iter_mut()
            .find(|file| file.log_id == evidence.log_id && file.file_path == evidence.file_path);
        match existing {
            Some(file) => file.checksum = evidence.checksum.clone(),
            None => state.evidence.push(EvidenceFile {
                id: Uuid::new_v4(),
                log_id: evidence.log_id,
                file_path: evidence.file_path.clone(),
                file_type: evidence.file_type.clone(),
                checksum: evidence.checksum.clone(),
            }),
        }
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::Closed)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

//! Maintenance record storage
//!
//! Ingestion writes through a [`MaintenanceStore`], one [`UnitOfWork`] per
//! archive entry. A unit is atomic: everything written through it becomes
//! visible on [`UnitOfWork::commit`], and dropping it uncommitted discards
//! every write.
//!
//! Two backends:
//!
//! - [`PgStore`]: PostgreSQL, one transaction per unit
//! - [`MemoryStore`]: in-process, for dry runs and tests

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Asset, LogKey, MaintenanceLog, NewDetail, NewEvidence, Resolved};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unit of work already committed")]
    Closed,

    #[error("Maintenance log {0} not found")]
    LogNotFound(Uuid),

    #[error("Invalid stored value: {0}")]
    Decode(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait MaintenanceStore: Send + Sync {
    /// Open a new atomic unit of work
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    /// Look up an asset by exact name, creating it with the default status
    /// if absent
    async fn resolve_asset(&mut self, name: &str) -> StoreResult<Resolved<Asset>>;

    /// Look up a header by its natural key, creating it as `pass` with the
    /// given worker if absent. An existing header is returned unchanged.
    async fn resolve_log(
        &mut self,
        key: LogKey,
        worker: Option<&str>,
    ) -> StoreResult<Resolved<MaintenanceLog>>;

    /// Set the header's result to `fail`. Never moves it back to `pass`.
    async fn mark_log_failed(&mut self, log_id: Uuid) -> StoreResult<()>;

    async fn insert_detail(&mut self, log_id: Uuid, detail: &NewDetail) -> StoreResult<Uuid>;

    /// Record an archived file. Re-recording the same path under the same
    /// header refreshes its checksum.
    async fn insert_evidence(&mut self, evidence: &NewEvidence) -> StoreResult<()>;

    /// Make every write of this unit durable. The unit is closed afterwards.
    async fn commit(&mut self) -> StoreResult<()>;
}

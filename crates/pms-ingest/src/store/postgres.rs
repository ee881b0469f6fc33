//! PostgreSQL maintenance store
//!
//! One transaction per unit of work. Resolve-or-create goes through
//! `INSERT ... ON CONFLICT DO NOTHING RETURNING id` and falls back to a
//! `SELECT` of the row another session committed first, so concurrent
//! ingestions of overlapping bundles never duplicate assets or headers.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{MaintenanceStore, StoreError, StoreResult, UnitOfWork};
use crate::models::{
    Asset, AssetStatus, EvidenceFile, LogKey, MaintenanceDetail, MaintenanceLog, NewDetail,
    NewEvidence, Resolved, ResultStatus,
};

type AssetRow = (Uuid, String, String);
type LogRow = (Uuid, Uuid, NaiveDate, String, Option<String>, String);
type DetailRow = (Uuid, Uuid, String, Option<String>, Option<serde_json::Value>);
type EvidenceRow = (Uuid, Uuid, String, String, Option<String>);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    pub async fn assets(&self) -> StoreResult<Vec<Asset>> {
        let rows = sqlx::query_as::<_, AssetRow>("SELECT id, name, status FROM assets ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(asset_from_row).collect()
    }

    pub async fn logs(&self) -> StoreResult<Vec<MaintenanceLog>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT id, asset_id, check_date, check_type, worker, result_status
            FROM maintenance_logs
            ORDER BY check_date, check_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(log_from_row).collect()
    }

    pub async fn details(&self, log_id: Uuid) -> StoreResult<Vec<MaintenanceDetail>> {
        let rows = sqlx::query_as::<_, DetailRow>(
            r#"
            SELECT id, log_id, item_name, value, raw_data
            FROM maintenance_details
            WHERE log_id = $1
            ORDER BY created_at, item_name
            "#,
        )
        .bind(log_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, log_id, item_name, value, raw_data)| MaintenanceDetail {
                id,
                log_id,
                item_name,
                value,
                raw_data,
            })
            .collect())
    }

    pub async fn evidence(&self, log_id: Uuid) -> StoreResult<Vec<EvidenceFile>> {
        let rows = sqlx::query_as::<_, EvidenceRow>(
            r#"
            SELECT id, log_id, file_path, file_type, checksum
            FROM evidence_files
            WHERE log_id = $1
            ORDER BY file_path
            "#,
        )
        .bind(log_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, log_id, file_path, file_type, checksum)| EvidenceFile {
                id,
                log_id,
                file_path,
                file_type,
                checksum,
            })
            .collect())
    }
}

#[async_trait]
impl MaintenanceStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

/// Rolled back by sqlx when dropped before commit
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn resolve_asset(&mut self, name: &str) -> StoreResult<Resolved<Asset>> {
        let tx = self.tx()?;
        let status = AssetStatus::default();

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO assets (id, name, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(status.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(id) = inserted {
            debug!(asset = name, %id, "Created asset");
            return Ok(Resolved::Created(Asset {
                id,
                name: name.to_string(),
                status,
            }));
        }

        // Already present, possibly committed by a concurrent ingestion
        let row =
            sqlx::query_as::<_, AssetRow>("SELECT id, name, status FROM assets WHERE name = $1")
                .bind(name)
                .fetch_one(&mut **tx)
                .await?;
        Ok(Resolved::Found(asset_from_row(row)?))
    }

    async fn resolve_log(
        &mut self,
        key: LogKey,
        worker: Option<&str>,
    ) -> StoreResult<Resolved<MaintenanceLog>> {
        let tx = self.tx()?;
        let result_status = ResultStatus::default();

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO maintenance_logs
                (id, asset_id, check_date, check_type, worker, result_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (asset_id, check_date, check_type) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(key.asset_id)
        .bind(key.check_date)
        .bind(key.check_type.as_str())
        .bind(worker)
        .bind(result_status.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(id) = inserted {
            debug!(%id, check_date = %key.check_date, check_type = %key.check_type, "Created maintenance log");
            return Ok(Resolved::Created(MaintenanceLog {
                id,
                asset_id: key.asset_id,
                check_date: key.check_date,
                check_type: key.check_type,
                worker: worker.map(str::to_string),
                result_status,
            }));
        }

        let row = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT id, asset_id, check_date, check_type, worker, result_status
            FROM maintenance_logs
            WHERE asset_id = $1 AND check_date = $2 AND check_type = $3
            "#,
        )
        .bind(key.asset_id)
        .bind(key.check_date)
        .bind(key.check_type.as_str())
        .fetch_one(&mut **tx)
        .await?;
        Ok(Resolved::Found(log_from_row(row)?))
    }

    async fn mark_log_failed(&mut self, log_id: Uuid) -> StoreResult<()> {
        let tx = self.tx()?;

        let result = sqlx::query(
            r#"
            UPDATE maintenance_logs
            SET result_status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(log_id)
        .bind(ResultStatus::Fail.as_str())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LogNotFound(log_id));
        }
        Ok(())
    }

    async fn insert_detail(&mut self, log_id: Uuid, detail: &NewDetail) -> StoreResult<Uuid> {
        let tx = self.tx()?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO maintenance_details (id, log_id, item_name, value, raw_data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(log_id)
        .bind(&detail.item_name)
        .bind(detail.value.as_deref())
        .bind(detail.raw_data.clone())
        .execute(&mut **tx)
        .await?;

        Ok(id)
    }

    async fn insert_evidence(&mut self, evidence: &NewEvidence) -> StoreResult<()> {
        let tx = self.tx()?;

        sqlx::query(
            r#"
            INSERT INTO evidence_files (id, log_id, file_path, file_type, checksum)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (log_id, file_path) DO UPDATE SET
                checksum = EXCLUDED.checksum
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(evidence.log_id)
        .bind(&evidence.file_path)
        .bind(&evidence.file_type)
        .bind(evidence.checksum.as_deref())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::Closed)?;
        tx.commit().await?;
        Ok(())
    }
}

fn asset_from_row((id, name, status): AssetRow) -> StoreResult<Asset> {
    Ok(Asset {
        id,
        name,
        status: status.parse().map_err(|e: anyhow::Error| StoreError::Decode(e.to_string()))?,
    })
}

fn log_from_row(
    (id, asset_id, check_date, check_type, worker, result_status): LogRow,
) -> StoreResult<MaintenanceLog> {
    Ok(MaintenanceLog {
        id,
        asset_id,
        check_date,
        check_type: check_type
            .parse()
            .map_err(|e: anyhow::Error| StoreError::Decode(e.to_string()))?,
        worker,
        result_status: result_status
            .parse()
            .map_err(|e: anyhow::Error| StoreError::Decode(e.to_string()))?,
    })
}

//! # Local Record Operations
//!
//! SQLite implementation of [`OfflineStore`]. Records of every entity share
//! the `local_records` table; `data` is stored as JSON text.

use super::{LocalDatabase, OfflineStore, Result};
use crate::shared::entity::merge_payload;
use crate::shared::{EntityKind, LocalRecord, StatusUpdate, StatusWrite, StoreError, SyncStatus};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const SELECT_RECORD: &str = "SELECT entity, id, user_id, data, sync_status, last_error, retry_count,
        server_created_at, server_updated_at, version
     FROM local_records";

fn row_to_record(row: &SqliteRow) -> Result<LocalRecord> {
    let id: String = row.try_get("id")?;
    let entity: String = row.try_get("entity")?;
    let status: String = row.try_get("sync_status")?;
    let data: String = row.try_get("data")?;
    let retry_count: i64 = row.try_get("retry_count")?;

    let corrupt = |message: String| StoreError::Corrupt {
        id: id.clone(),
        message,
    };

    Ok(LocalRecord {
        entity: entity.parse().map_err(corrupt)?,
        sync_status: status.parse().map_err(corrupt)?,
        data: serde_json::from_str(&data)?,
        user_id: row.try_get("user_id")?,
        last_error: row.try_get("last_error")?,
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
        server_created_at: row.try_get("server_created_at")?,
        server_updated_at: row.try_get("server_updated_at")?,
        version: row.try_get("version")?,
        id,
    })
}

#[async_trait]
impl OfflineStore for LocalDatabase {
    async fn get_by_id(&self, entity: EntityKind, record_id: &str) -> Result<Option<LocalRecord>> {
        let row = sqlx::query(&format!("{} WHERE entity = ? AND id = ?", SELECT_RECORD))
            .bind(entity.as_str())
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn update_sync_status(
        &self,
        entity: EntityKind,
        record_id: &str,
        expected_version: i64,
        status: SyncStatus,
        update: &StatusUpdate,
    ) -> Result<StatusWrite> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("{} WHERE entity = ? AND id = ?", SELECT_RECORD))
            .bind(entity.as_str())
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(StatusWrite::Missing);
        };
        let mut record = row_to_record(&row)?;
        if record.version != expected_version {
            if update.has_server_fields() {
                record.apply_server_fields(update);
                sqlx::query(
                    "UPDATE local_records SET data = ?, server_created_at = ?, server_updated_at = ?
                     WHERE entity = ? AND id = ? AND version = ?",
                )
                .bind(serde_json::to_string(&record.data)?)
                .bind(&record.server_created_at)
                .bind(&record.server_updated_at)
                .bind(entity.as_str())
                .bind(record_id)
                .bind(record.version)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
            }
            return Ok(StatusWrite::Superseded);
        }

        record.apply_status_update(status, update);

        let result = sqlx::query(
            "UPDATE local_records SET
                data = ?,
                sync_status = ?,
                last_error = ?,
                retry_count = ?,
                server_created_at = ?,
                server_updated_at = ?,
                updated_at = ?
             WHERE entity = ? AND id = ? AND version = ?",
        )
        .bind(serde_json::to_string(&record.data)?)
        .bind(record.sync_status.as_str())
        .bind(&record.last_error)
        .bind(i64::from(record.retry_count))
        .bind(&record.server_created_at)
        .bind(&record.server_updated_at)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(entity.as_str())
        .bind(record_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            Ok(StatusWrite::Superseded)
        } else {
            Ok(StatusWrite::Applied)
        }
    }

    async fn save_local_mutation(
        &self,
        entity: EntityKind,
        record_id: &str,
        user_id: &str,
        data: Value,
    ) -> Result<LocalRecord> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT data FROM local_records WHERE entity = ? AND id = ?")
            .bind(entity.as_str())
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await?;

        let payload = match existing {
            Some(row) => {
                let stored: String = row.try_get("data")?;
                merge_payload(&serde_json::from_str(&stored)?, data)
            }
            None => data,
        };

        sqlx::query(
            "INSERT INTO local_records (entity, id, user_id, data, sync_status, retry_count, version, updated_at)
             VALUES (?, ?, ?, ?, 'pending', 0, 1, ?)
             ON CONFLICT (entity, id) DO UPDATE SET
                user_id = excluded.user_id,
                data = excluded.data,
                sync_status = 'pending',
                last_error = NULL,
                retry_count = 0,
                version = local_records.version + 1,
                updated_at = excluded.updated_at",
        )
        .bind(entity.as_str())
        .bind(record_id)
        .bind(user_id)
        .bind(serde_json::to_string(&payload)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("{} WHERE entity = ? AND id = ?", SELECT_RECORD))
            .bind(entity.as_str())
            .bind(record_id)
            .fetch_one(&mut *tx)
            .await?;
        let record = row_to_record(&row)?;

        tx.commit().await?;
        tracing::debug!(%entity, record_id, version = record.version, "Saved local mutation");
        Ok(record)
    }

    async fn delete_record(&self, entity: EntityKind, record_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM local_records WHERE entity = ? AND id = ?")
            .bind(entity.as_str())
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_status(&self, entity: EntityKind, status: SyncStatus) -> Result<Vec<LocalRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE entity = ? AND sync_status = ? ORDER BY updated_at ASC",
            SELECT_RECORD
        ))
        .bind(entity.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

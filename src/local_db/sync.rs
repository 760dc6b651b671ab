//! # Sync Queue Persistence
//!
//! SQLite journal for the offline queue and the sync metadata table.
//!
//! ## Features
//!
//! - **Offline Queue**: every queued or dead-lettered operation is one row in
//!   `offline_queue`, so a restart picks up where the last run stopped
//! - **Sync Metadata**: key/value pairs such as the last successful sync
//! - **Cleanup**: drop dead letters older than a cutoff

use super::{LocalDatabase, Result};
use crate::offline::{OperationRecord, QueueJournal};
use crate::shared::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

const LAST_SYNC_KEY: &str = "last_sync_time";

fn parse_time(id: &str, column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            message: format!("bad {}: {}", column, e),
        })
}

fn row_to_operation(row: &SqliteRow) -> Result<OperationRecord> {
    let id: String = row.try_get("id")?;
    let sequence: i64 = row.try_get("sequence")?;
    let data: String = row.try_get("data")?;
    let created_at: String = row.try_get("created_at")?;
    let retry_count: i64 = row.try_get("retry_count")?;
    let next_attempt_at: Option<String> = row.try_get("next_attempt_at")?;
    let last_attempt: Option<String> = row.try_get("last_attempt")?;
    let dead_lettered: i64 = row.try_get("dead_lettered")?;

    let queued_at = parse_time(&id, "created_at", &created_at)?;
    let next_attempt_at = match next_attempt_at {
        Some(value) => parse_time(&id, "next_attempt_at", &value)?,
        None => queued_at,
    };
    let last_attempt = last_attempt
        .map(|value| parse_time(&id, "last_attempt", &value))
        .transpose()?;

    Ok(OperationRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            message: e.to_string(),
        })?,
        sequence: u64::try_from(sequence).unwrap_or_default(),
        entity: row.try_get("entity")?,
        record_id: row.try_get("record_id")?,
        operation_type: row.try_get("operation_type")?,
        data: serde_json::from_str(&data)?,
        queued_at,
        attempts: u32::try_from(retry_count).unwrap_or(u32::MAX),
        next_attempt_at,
        last_attempt,
        last_error: row.try_get("error_message")?,
        dead_lettered: dead_lettered != 0,
    })
}

#[async_trait]
impl QueueJournal for LocalDatabase {
    async fn save(&self, record: &OperationRecord) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO offline_queue
                (id, sequence, entity, record_id, operation_type, data, created_at,
                 retry_count, next_attempt_at, last_attempt, error_message, dead_lettered)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(i64::try_from(record.sequence).unwrap_or(i64::MAX))
        .bind(&record.entity)
        .bind(&record.record_id)
        .bind(&record.operation_type)
        .bind(serde_json::to_string(&record.data)?)
        .bind(record.queued_at.to_rfc3339())
        .bind(i64::from(record.attempts))
        .bind(record.next_attempt_at.to_rfc3339())
        .bind(record.last_attempt.map(|time| time.to_rfc3339()))
        .bind(record.last_error.as_deref())
        .bind(record.dead_lettered)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM offline_queue WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<OperationRecord>> {
        let rows = sqlx::query(
            "SELECT id, sequence, entity, record_id, operation_type, data, created_at,
                    retry_count, next_attempt_at, last_attempt, error_message, dead_lettered
             FROM offline_queue
             ORDER BY sequence ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_operation).collect()
    }
}

impl LocalDatabase {
    /// Delete dead letters queued before `cutoff`; returns how many went
    pub async fn purge_dead_letters(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM offline_queue WHERE dead_lettered = 1 AND created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Set sync metadata
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    pub async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_sync_metadata(LAST_SYNC_KEY)
            .await?
            .map(|value| parse_time(LAST_SYNC_KEY, "value", &value))
            .transpose()
    }

    pub async fn set_last_sync_time(&self, time: DateTime<Utc>) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_KEY, &time.to_rfc3339()).await
    }
}

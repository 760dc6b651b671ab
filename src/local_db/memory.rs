use super::{OfflineStore, Result};
use crate::shared::entity::merge_payload;
use crate::shared::{EntityKind, LocalRecord, StatusUpdate, StatusWrite, SyncStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process [`OfflineStore`], same semantics as the SQLite store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(EntityKind, String), LocalRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, replacing any existing one
    pub async fn insert(&self, record: LocalRecord) {
        let mut records = self.records.write().await;
        records.insert((record.entity, record.id.clone()), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn get_by_id(&self, entity: EntityKind, record_id: &str) -> Result<Option<LocalRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&(entity, record_id.to_string())).cloned())
    }

    async fn update_sync_status(
        &self,
        entity: EntityKind,
        record_id: &str,
        expected_version: i64,
        status: SyncStatus,
        update: &StatusUpdate,
    ) -> Result<StatusWrite> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&(entity, record_id.to_string())) else {
            return Ok(StatusWrite::Missing);
        };
        if record.version != expected_version {
            record.apply_server_fields(update);
            return Ok(StatusWrite::Superseded);
        }
        record.apply_status_update(status, update);
        Ok(StatusWrite::Applied)
    }

    async fn save_local_mutation(
        &self,
        entity: EntityKind,
        record_id: &str,
        user_id: &str,
        data: Value,
    ) -> Result<LocalRecord> {
        let mut records = self.records.write().await;
        let record = records
            .entry((entity, record_id.to_string()))
            .and_modify(|record| {
                record.data = merge_payload(&record.data, data.clone());
                record.user_id = user_id.to_string();
                record.sync_status = SyncStatus::Pending;
                record.last_error = None;
                record.retry_count = 0;
                record.version += 1;
            })
            .or_insert_with(|| LocalRecord {
                id: record_id.to_string(),
                entity,
                user_id: user_id.to_string(),
                data: data.clone(),
                sync_status: SyncStatus::Pending,
                last_error: None,
                retry_count: 0,
                server_created_at: None,
                server_updated_at: None,
                version: 1,
            });
        Ok(record.clone())
    }

    async fn delete_record(&self, entity: EntityKind, record_id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&(entity, record_id.to_string())).is_some())
    }

    async fn list_by_status(&self, entity: EntityKind, status: SyncStatus) -> Result<Vec<LocalRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<LocalRecord> = records
            .values()
            .filter(|r| r.entity == entity && r.sync_status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }
}

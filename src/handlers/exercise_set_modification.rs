use super::{require_key, server_timestamps, EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::api::types::optional_string_or_number;
use crate::api::{Acknowledged, ExerciseSetModificationService, SetModificationFields};
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, SyncError, SyncResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Server-assigned key merged into the local payload after create
pub const SERVER_KEY: &str = "ModificationId";

/// Set modification as stored locally, with the server id once known
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocalSetModification {
    #[serde(flatten)]
    fields: SetModificationFields,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    modification_id: Option<String>,
}

impl LocalSetModification {
    fn acknowledged(self) -> Option<Acknowledged<SetModificationFields>> {
        let server_id = self.modification_id?;
        Some(Acknowledged {
            server_id,
            fields: self.fields,
        })
    }
}

/// Syncs per-exercise set count changes
pub struct ExerciseSetModificationHandler {
    records: LocalRecords,
    service: Arc<dyn ExerciseSetModificationService>,
}

impl ExerciseSetModificationHandler {
    pub fn new(store: Arc<dyn OfflineStore>, service: Arc<dyn ExerciseSetModificationService>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
            service,
        }
    }
}

#[async_trait]
impl EntitySyncHandler for ExerciseSetModificationHandler {
    const ENTITY: EntityKind = EntityKind::ExerciseSetModification;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let local: LocalSetModification = self.records.parse(&record)?;

        let payload = self
            .records
            .push_acknowledged(
                &record,
                self.service
                    .create_exercise_set_modification(&record.user_id, &local.fields),
                SERVER_KEY,
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let local: LocalSetModification = self.records.parse(&record)?;
        let acknowledged = local.acknowledged().ok_or_else(|| {
            tracing::error!(record_id, "Update queued before create was acknowledged");
            SyncError::missing_server_id(Self::ENTITY, record_id)
        })?;

        let payload = self
            .records
            .push(
                &record,
                self.service
                    .update_exercise_set_modification(&record.user_id, &acknowledged),
                server_timestamps,
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        let user_id = require_key(Self::ENTITY, data, "userId")?;
        let modification_id = require_key(Self::ENTITY, data, "modificationId")?;

        self.service
            .delete_exercise_set_modification(&user_id, &modification_id)
            .await?;
        tracing::info!(%user_id, %modification_id, "Deleted exercise set modification on server");
        Ok(SyncOutcome::Deleted)
    }
}

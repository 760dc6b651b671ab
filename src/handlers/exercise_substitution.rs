use super::{require_key, server_timestamps, EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::api::types::optional_string_or_number;
use crate::api::{Acknowledged, ExerciseSubstitutionService, SubstitutionFields};
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, SyncError, SyncResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const SERVER_KEY: &str = "SubstitutionId";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocalSubstitution {
    #[serde(flatten)]
    fields: SubstitutionFields,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    substitution_id: Option<String>,
}

impl LocalSubstitution {
    fn into_acknowledged(self, record_id: &str) -> SyncResult<Acknowledged<SubstitutionFields>> {
        match self.substitution_id {
            Some(server_id) => Ok(Acknowledged {
                server_id,
                fields: self.fields,
            }),
            None => {
                tracing::error!(record_id, "Substitution update queued before create was acknowledged");
                Err(SyncError::missing_server_id(EntityKind::ExerciseSubstitution, record_id))
            }
        }
    }
}

/// Syncs swaps of one exercise for another within a program
pub struct ExerciseSubstitutionHandler {
    records: LocalRecords,
    service: Arc<dyn ExerciseSubstitutionService>,
}

impl ExerciseSubstitutionHandler {
    pub fn new(store: Arc<dyn OfflineStore>, service: Arc<dyn ExerciseSubstitutionService>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
            service,
        }
    }
}

#[async_trait]
impl EntitySyncHandler for ExerciseSubstitutionHandler {
    const ENTITY: EntityKind = EntityKind::ExerciseSubstitution;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let local: LocalSubstitution = self.records.parse(&record)?;

        let payload = self
            .records
            .push_acknowledged(
                &record,
                self.service
                    .create_exercise_substitution(&record.user_id, &local.fields),
                SERVER_KEY,
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let local: LocalSubstitution = self.records.parse(&record)?;
        let acknowledged = local.into_acknowledged(record_id)?;

        let payload = self
            .records
            .push(
                &record,
                self.service
                    .update_exercise_substitution(&record.user_id, &acknowledged),
                server_timestamps,
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        let user_id = require_key(Self::ENTITY, data, "userId")?;
        let substitution_id = require_key(Self::ENTITY, data, "substitutionId")?;

        self.service
            .delete_exercise_substitution(&user_id, &substitution_id)
            .await?;
        tracing::info!(%user_id, %substitution_id, "Deleted exercise substitution on server");
        Ok(SyncOutcome::Deleted)
    }
}

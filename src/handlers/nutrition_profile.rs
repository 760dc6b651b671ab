use super::{server_timestamps, EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::api::NutritionProfileService;
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, SyncResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const PROFILE_KEY: &str = "userNutritionProfile";

fn inner_profile(payload: &Value) -> &Value {
    payload.get(PROFILE_KEY).unwrap_or(payload)
}

/// Syncs the per-user nutrition profile; create and update are one upsert
pub struct NutritionProfileHandler {
    records: LocalRecords,
    service: Arc<dyn NutritionProfileService>,
}

impl NutritionProfileHandler {
    pub fn new(store: Arc<dyn OfflineStore>, service: Arc<dyn NutritionProfileService>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
            service,
        }
    }

    async fn upsert(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;

        let payload = self
            .records
            .push(
                &record,
                self.service
                    .update_user_nutrition_profile(&record.user_id, &record.data),
                |payload| server_timestamps(inner_profile(payload)),
            )
            .await?;

        let profile = match payload {
            Value::Object(mut map) if map.contains_key(PROFILE_KEY) => {
                map.remove(PROFILE_KEY).unwrap_or_default()
            }
            other => other,
        };
        Ok(SyncOutcome::Synced(profile))
    }
}

#[async_trait]
impl EntitySyncHandler for NutritionProfileHandler {
    const ENTITY: EntityKind = EntityKind::NutritionProfile;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        self.upsert(record_id).await
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        self.upsert(record_id).await
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        tracing::warn!(?data, "Nutrition profile delete is not supported");
        Ok(SyncOutcome::NotImplemented {
            reason: "nutrition profiles are never deleted",
        })
    }
}

use super::{EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, StatusUpdate, SyncResult, SyncStatus};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

const UNSUPPORTED: &str = "macro targets are derived from nutrition goals on the server";

/// Placeholder handler for macro targets.
///
/// The backend has no direct target endpoint. Creates and updates are accepted
/// locally with a synthesized server timestamp so the queue keeps moving, and
/// every path reports [`SyncOutcome::NotImplemented`].
pub struct MacroTargetHandler {
    records: LocalRecords,
}

impl MacroTargetHandler {
    pub fn new(store: Arc<dyn OfflineStore>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
        }
    }

    async fn accept_locally(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        tracing::warn!(record_id, "Direct macro target sync is not supported; marking synced locally");

        let now = Utc::now().to_rfc3339();
        self.records
            .update_local_sync_status(
                &record,
                SyncStatus::Synced,
                StatusUpdate::default().with_server_timestamps(None, Some(now)),
            )
            .await?;
        Ok(SyncOutcome::NotImplemented { reason: UNSUPPORTED })
    }
}

#[async_trait]
impl EntitySyncHandler for MacroTargetHandler {
    const ENTITY: EntityKind = EntityKind::MacroTarget;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        self.accept_locally(record_id).await
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        self.accept_locally(record_id).await
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        tracing::warn!(?data, "Macro target delete has no server counterpart");
        Ok(SyncOutcome::NotImplemented { reason: UNSUPPORTED })
    }
}

//! Program progress sync.
//!
//! Progress is one mutable row per user. Updates do not carry an explicit
//! endpoint; the handler reads `LastAction` from the buffered record and picks
//! the matching progress call. Day ids come from the newest matching entry of
//! the optional `CompletionLog`, falling back to `CompletedDays` order.

use super::{require_key, server_timestamps, EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::api::types::string_or_number;
use crate::api::ProgramProgressService;
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, LocalRecord, StatusUpdate, SyncError, SyncResult, SyncStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Last local change recorded on a progress row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressAction {
    CompleteDay,
    UncompleteDay,
    EndProgram,
    ResetProgram,
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct DayId(#[serde(deserialize_with = "string_or_number")] String);

/// One timestamped day completion change
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompletionEvent {
    day_id: DayId,
    action: ProgressAction,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocalProgress {
    #[serde(default, deserialize_with = "crate::api::types::optional_string_or_number")]
    program_id: Option<String>,
    #[serde(default)]
    current_day: Option<u32>,
    #[serde(default)]
    completed_days: Vec<DayId>,
    #[serde(default)]
    last_action: Option<ProgressAction>,
    #[serde(default)]
    completion_log: Vec<CompletionEvent>,
}

impl LocalProgress {
    fn is_fresh_start(&self) -> bool {
        self.current_day == Some(1) && self.completed_days.is_empty()
    }

    fn logged_day(&self, action: ProgressAction) -> Option<String> {
        self.completion_log
            .iter()
            .filter(|event| event.action == action)
            .max_by_key(|event| event.timestamp)
            .map(|event| event.day_id.0.clone())
    }

    fn last_completed(&self) -> Option<String> {
        self.completed_days.last().map(|day| day.0.clone())
    }

    fn day_to_complete(&self) -> Option<String> {
        self.logged_day(ProgressAction::CompleteDay)
            .or_else(|| self.last_completed())
            .or_else(|| self.current_day.map(|day| day.to_string()))
    }

    fn day_to_uncomplete(&self) -> Option<String> {
        self.logged_day(ProgressAction::UncompleteDay)
            .or_else(|| self.last_completed())
    }
}

/// Syncs a user's progress through a training program
pub struct ProgramProgressHandler {
    records: LocalRecords,
    service: Arc<dyn ProgramProgressService>,
}

impl ProgramProgressHandler {
    pub fn new(store: Arc<dyn OfflineStore>, service: Arc<dyn ProgramProgressService>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
            service,
        }
    }

    async fn accept_unrecognized(
        &self,
        record: &LocalRecord,
        action: Option<ProgressAction>,
    ) -> SyncResult<SyncOutcome> {
        tracing::warn!(
            record_id = %record.id,
            last_action = ?action,
            "Unrecognized progress action; marking synced without a server call"
        );
        self.records
            .update_local_sync_status(record, SyncStatus::Synced, StatusUpdate::default())
            .await?;
        Ok(SyncOutcome::NotImplemented {
            reason: "progress action has no server endpoint",
        })
    }

    fn missing_day(record: &LocalRecord, action: ProgressAction) -> SyncError {
        SyncError::invalid_record(
            Self::ENTITY,
            &record.id,
            format!("no day id for {:?}", action),
        )
    }
}

#[async_trait]
impl EntitySyncHandler for ProgramProgressHandler {
    const ENTITY: EntityKind = EntityKind::ProgramProgress;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let progress: LocalProgress = self.records.parse(&record)?;

        if !progress.is_fresh_start() {
            tracing::error!(
                record_id,
                current_day = ?progress.current_day,
                completed = progress.completed_days.len(),
                "Creation for existing progress not supported"
            );
            return Err(SyncError::UnsupportedCreate {
                record_id: record_id.to_string(),
            });
        }
        let program_id = progress
            .program_id
            .ok_or_else(|| SyncError::invalid_record(Self::ENTITY, record_id, "missing ProgramId"))?;

        let payload = self
            .records
            .push(
                &record,
                self.service.start_program(&record.user_id, &program_id),
                server_timestamps,
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let progress: LocalProgress = self.records.parse(&record)?;
        let user_id = record.user_id.as_str();

        let day_id: String;
        let (action, call) = match progress.last_action {
            Some(action @ ProgressAction::CompleteDay) => {
                day_id = progress
                    .day_to_complete()
                    .ok_or_else(|| Self::missing_day(&record, action))?;
                tracing::debug!(record_id, %day_id, "Completing program day");
                (action, self.service.complete_day(user_id, &day_id, true))
            }
            Some(action @ ProgressAction::UncompleteDay) => {
                day_id = progress
                    .day_to_uncomplete()
                    .ok_or_else(|| Self::missing_day(&record, action))?;
                tracing::debug!(record_id, %day_id, "Reverting program day");
                (action, self.service.uncomplete_day(user_id, &day_id))
            }
            Some(action @ ProgressAction::EndProgram) => (action, self.service.end_program(user_id)),
            Some(action @ ProgressAction::ResetProgram) => (action, self.service.reset_program(user_id)),
            other @ (Some(ProgressAction::Unrecognized) | None) => {
                return self.accept_unrecognized(&record, other).await;
            }
        };

        let payload = self.records.push(&record, call, server_timestamps).await?;
        if action == ProgressAction::CompleteDay && payload.is_null() {
            tracing::info!(record_id, "Final day completed; program finished");
        }
        Ok(SyncOutcome::Synced(payload))
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        let user_id = require_key(Self::ENTITY, data, "userId")?;

        self.service.end_program(&user_id).await?;
        tracing::info!(%user_id, "Ended program on server");
        Ok(SyncOutcome::Deleted)
    }
}

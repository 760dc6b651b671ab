use super::{server_timestamps, EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::api::{NutritionGoalFields, NutritionGoalService};
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, StatusUpdate, SyncResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Normalize a server response to a list of rows.
///
/// Arrays pass through, `null` becomes empty and anything else is wrapped.
/// Applying it to its own output changes nothing.
pub fn to_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocalNutritionGoal {
    #[serde(flatten)]
    goal: NutritionGoalFields,
    #[serde(default)]
    adjustment_reason: Option<String>,
    #[serde(default)]
    adjustment_notes: Option<String>,
}

/// Timestamps of the returned goal matching the local effective date
fn matching_goal_status(goals: &Value, effective_date: &str) -> StatusUpdate {
    let matching = match goals {
        Value::Array(items) => items
            .iter()
            .find(|goal| goal.get("EffectiveDate").and_then(Value::as_str) == Some(effective_date)),
        single => Some(single),
    };
    matching.map(server_timestamps).unwrap_or_default()
}

/// Syncs nutrition goals through the upsert endpoints.
///
/// The server may cascade a new goal into historical rows, so both writes
/// answer with the user's complete goal list.
pub struct NutritionGoalHandler {
    records: LocalRecords,
    service: Arc<dyn NutritionGoalService>,
}

#[derive(Debug, Clone, Copy)]
enum GoalWrite {
    Create,
    Update,
}

impl NutritionGoalHandler {
    pub fn new(store: Arc<dyn OfflineStore>, service: Arc<dyn NutritionGoalService>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
            service,
        }
    }

    async fn upsert(&self, record_id: &str, write: GoalWrite) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let local: LocalNutritionGoal = self.records.parse(&record)?;
        let reason = local.adjustment_reason.as_deref();
        let notes = local.adjustment_notes.as_deref();

        let call = match write {
            GoalWrite::Create => {
                self.service
                    .create_nutrition_goal(&record.user_id, &local.goal, reason, notes)
            }
            GoalWrite::Update => {
                self.service
                    .update_nutrition_goal(&record.user_id, &local.goal, reason, notes)
            }
        };
        let payload = self
            .records
            .push(&record, call, |goals| {
                matching_goal_status(goals, &local.goal.effective_date)
            })
            .await?;

        let goals = to_array(payload);
        tracing::debug!(record_id, goals = goals.len(), "Server returned goal list");
        Ok(SyncOutcome::SyncedMany(goals))
    }
}

#[async_trait]
impl EntitySyncHandler for NutritionGoalHandler {
    const ENTITY: EntityKind = EntityKind::NutritionGoal;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        self.upsert(record_id, GoalWrite::Create).await
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        self.upsert(record_id, GoalWrite::Update).await
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        tracing::warn!(?data, "Nutrition goal delete has no server endpoint");
        Ok(SyncOutcome::NotImplemented {
            reason: "nutrition goals cannot be deleted on the server",
        })
    }
}

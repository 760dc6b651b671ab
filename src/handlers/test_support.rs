//! Recording fakes for handler tests.

use crate::api::{
    Acknowledged, ApiResult, BodyMeasurementService, ExerciseSetModificationService,
    ExerciseSubstitutionService, Measurements, NutritionGoalFields, NutritionGoalService,
    NutritionProfileService, ProgramProgressService, SetModificationFields, SubstitutionFields,
};
use crate::local_db::{MemoryStore, OfflineStore, Result};
use crate::shared::{ApiError, EntityKind, LocalRecord, StatusUpdate, StatusWrite, StoreError, SyncStatus};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One remote call as seen by [`FakeApi`]
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub method: &'static str,
    pub args: Value,
}

/// Implements every remote service, records calls and replays scripted replies
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<RemoteCall>>,
    replies: Mutex<HashMap<&'static str, VecDeque<ApiResult>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply for the next call to `method`
    pub fn reply(&self, method: &'static str, result: ApiResult) {
        self.replies
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(result);
    }

    pub fn fail(&self, method: &'static str, error: ApiError) {
        self.reply(method, Err(error));
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .map(|call| call.args)
            .collect()
    }

    fn record(&self, method: &'static str, args: Value) -> ApiResult {
        self.calls.lock().unwrap().push(RemoteCall { method, args });
        self.replies
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Ok(json!({
                    "CreatedAt": "2024-01-01T00:00:01Z",
                    "UpdatedAt": "2024-01-01T00:00:02Z",
                }))
            })
    }
}

#[async_trait]
impl BodyMeasurementService for FakeApi {
    async fn log_body_measurement(&self, user_id: &str, measurements: &Measurements, timestamp: &str) -> ApiResult {
        self.record(
            "log_body_measurement",
            json!([user_id, measurements, timestamp]),
        )
    }

    async fn update_body_measurement(&self, user_id: &str, timestamp: &str, measurements: &Measurements) -> ApiResult {
        self.record(
            "update_body_measurement",
            json!([user_id, timestamp, measurements]),
        )
    }

    async fn delete_body_measurement(&self, user_id: &str, timestamp: &str) -> ApiResult {
        self.record("delete_body_measurement", json!([user_id, timestamp]))
    }
}

#[async_trait]
impl ExerciseSetModificationService for FakeApi {
    async fn create_exercise_set_modification(&self, user_id: &str, modification: &SetModificationFields) -> ApiResult {
        self.record(
            "create_exercise_set_modification",
            json!([user_id, modification]),
        )
    }

    async fn update_exercise_set_modification(
        &self,
        user_id: &str,
        modification: &Acknowledged<SetModificationFields>,
    ) -> ApiResult {
        self.record(
            "update_exercise_set_modification",
            json!([user_id, modification.server_id, modification.fields]),
        )
    }

    async fn delete_exercise_set_modification(&self, user_id: &str, modification_id: &str) -> ApiResult {
        self.record(
            "delete_exercise_set_modification",
            json!([user_id, modification_id]),
        )
    }
}

#[async_trait]
impl ExerciseSubstitutionService for FakeApi {
    async fn create_exercise_substitution(&self, user_id: &str, substitution: &SubstitutionFields) -> ApiResult {
        self.record("create_exercise_substitution", json!([user_id, substitution]))
    }

    async fn update_exercise_substitution(
        &self,
        user_id: &str,
        substitution: &Acknowledged<SubstitutionFields>,
    ) -> ApiResult {
        self.record(
            "update_exercise_substitution",
            json!([user_id, substitution.server_id, substitution.fields]),
        )
    }

    async fn delete_exercise_substitution(&self, user_id: &str, substitution_id: &str) -> ApiResult {
        self.record(
            "delete_exercise_substitution",
            json!([user_id, substitution_id]),
        )
    }
}

#[async_trait]
impl NutritionGoalService for FakeApi {
    async fn create_nutrition_goal(
        &self,
        user_id: &str,
        goal: &NutritionGoalFields,
        adjustment_reason: Option<&str>,
        adjustment_notes: Option<&str>,
    ) -> ApiResult {
        self.record(
            "create_nutrition_goal",
            json!([user_id, goal, adjustment_reason, adjustment_notes]),
        )
    }

    async fn update_nutrition_goal(
        &self,
        user_id: &str,
        goal: &NutritionGoalFields,
        adjustment_reason: Option<&str>,
        adjustment_notes: Option<&str>,
    ) -> ApiResult {
        self.record(
            "update_nutrition_goal",
            json!([user_id, goal, adjustment_reason, adjustment_notes]),
        )
    }
}

#[async_trait]
impl NutritionProfileService for FakeApi {
    async fn update_user_nutrition_profile(&self, user_id: &str, profile: &Value) -> ApiResult {
        self.record("update_user_nutrition_profile", json!([user_id, profile]))
    }
}

#[async_trait]
impl ProgramProgressService for FakeApi {
    async fn start_program(&self, user_id: &str, program_id: &str) -> ApiResult {
        self.record("start_program", json!([user_id, program_id]))
    }

    async fn complete_day(&self, user_id: &str, day_id: &str, auto_complete: bool) -> ApiResult {
        self.record("complete_day", json!([user_id, day_id, auto_complete]))
    }

    async fn uncomplete_day(&self, user_id: &str, day_id: &str) -> ApiResult {
        self.record("uncomplete_day", json!([user_id, day_id]))
    }

    async fn end_program(&self, user_id: &str) -> ApiResult {
        self.record("end_program", json!([user_id]))
    }

    async fn reset_program(&self, user_id: &str) -> ApiResult {
        self.record("reset_program", json!([user_id]))
    }
}

/// One status write as seen by [`RecordingStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCall {
    pub record_id: String,
    pub status: SyncStatus,
    pub update: StatusUpdate,
}

/// [`MemoryStore`] wrapper that records every status write
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    status_calls: Mutex<Vec<StatusCall>>,
    failing_status_writes: Mutex<u32>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a pending record at version 1
    pub async fn seed(&self, entity: EntityKind, id: &str, user_id: &str, data: Value) -> LocalRecord {
        let record = LocalRecord {
            id: id.to_string(),
            entity,
            user_id: user_id.to_string(),
            data,
            sync_status: SyncStatus::Pending,
            last_error: None,
            retry_count: 0,
            server_created_at: None,
            server_updated_at: None,
            version: 1,
        };
        self.inner.insert(record.clone()).await;
        record
    }

    /// Make the next `count` status writes fail with a database error
    pub fn fail_status_writes(&self, count: u32) {
        *self.failing_status_writes.lock().unwrap() = count;
    }

    pub fn status_calls(&self) -> Vec<StatusCall> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn status_calls_with(&self, status: SyncStatus) -> Vec<StatusCall> {
        self.status_calls()
            .into_iter()
            .filter(|call| call.status == status)
            .collect()
    }
}

#[async_trait]
impl OfflineStore for RecordingStore {
    async fn get_by_id(&self, entity: EntityKind, record_id: &str) -> Result<Option<LocalRecord>> {
        self.inner.get_by_id(entity, record_id).await
    }

    async fn update_sync_status(
        &self,
        entity: EntityKind,
        record_id: &str,
        expected_version: i64,
        status: SyncStatus,
        update: &StatusUpdate,
    ) -> Result<StatusWrite> {
        self.status_calls.lock().unwrap().push(StatusCall {
            record_id: record_id.to_string(),
            status,
            update: update.clone(),
        });
        {
            let mut failing = self.failing_status_writes.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
        }
        self.inner
            .update_sync_status(entity, record_id, expected_version, status, update)
            .await
    }

    async fn save_local_mutation(
        &self,
        entity: EntityKind,
        record_id: &str,
        user_id: &str,
        data: Value,
    ) -> Result<LocalRecord> {
        self.inner.save_local_mutation(entity, record_id, user_id, data).await
    }

    async fn delete_record(&self, entity: EntityKind, record_id: &str) -> Result<bool> {
        self.inner.delete_record(entity, record_id).await
    }

    async fn list_by_status(&self, entity: EntityKind, status: SyncStatus) -> Result<Vec<LocalRecord>> {
        self.inner.list_by_status(entity, status).await
    }
}

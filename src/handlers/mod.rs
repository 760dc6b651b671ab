//! # Entity Sync Handlers
//!
//! A sync handler turns one queued local mutation into the remote calls for
//! its entity and writes the outcome back to the local store.
//!
//! ## Contract
//!
//! [`SyncHandler::sync_to_server`] dispatches on the operation:
//!
//! - `Create` loads the local record and creates it on the server
//! - `Update` loads the local record and updates the server copy
//! - `Delete` works from the key fields carried by the operation, because the
//!   local record may already be gone
//!
//! Create and update share one template ([`LocalRecords`]):
//!
//! 1. load the record, failing with `RecordNotFound` if it is absent
//! 2. build the minimal request from `record.data`
//! 3. call the remote service
//! 4. on success mark the record `synced` with server timestamps and keys; a
//!    failure of this local write is logged, never retried
//! 5. on failure mark it `failed` (retry count +1) and return the original
//!    error; a 409 marks it `conflict` instead
//!
//! Entities differ only in the delete keys they require, the subset of `data`
//! they send and how the server response is normalized. Handlers implement
//! [`EntitySyncHandler`] and get [`SyncHandler`] through a blanket impl.
//!
//! ## Handlers
//!
//! - `body_measurement.rs`: sparse measurement maps keyed by timestamp
//! - `exercise_set_modification.rs` / `exercise_substitution.rs`: server ids
//! - `macro_target.rs`: placeholder, never contacts the network
//! - `nutrition_goal.rs`: upserts answering with the whole goal list
//! - `nutrition_profile.rs`: one profile per user
//! - `program_progress.rs`: endpoint chosen from the last local action
//! - `registry.rs`: entity to handler map held by the queue manager

pub mod body_measurement;
pub mod exercise_set_modification;
pub mod exercise_substitution;
pub mod macro_target;
pub mod nutrition_goal;
pub mod nutrition_profile;
pub mod program_progress;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use body_measurement::BodyMeasurementHandler;
pub use exercise_set_modification::ExerciseSetModificationHandler;
pub use exercise_substitution::ExerciseSubstitutionHandler;
pub use macro_target::MacroTargetHandler;
pub use nutrition_goal::NutritionGoalHandler;
pub use nutrition_profile::NutritionProfileHandler;
pub use program_progress::ProgramProgressHandler;
pub use registry::HandlerRegistry;

use crate::api::ApiResult;
use crate::local_db::OfflineStore;
use crate::shared::{ApiError, EntityKind, LocalRecord, StatusUpdate, StatusWrite, SyncError, SyncResult, SyncStatus};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of write a queued operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Tag used in the persisted queue
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(OperationKind::Create),
            "UPDATE" => Ok(OperationKind::Update),
            "DELETE" => Ok(OperationKind::Delete),
            other => Err(SyncError::unknown_operation(other)),
        }
    }
}

/// A local mutation to push to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOperation {
    Create { record_id: String },
    Update { record_id: String },
    /// `data` carries the natural key fields the server needs
    Delete { record_id: String, data: Value },
}

impl SyncOperation {
    pub fn create(record_id: impl Into<String>) -> Self {
        SyncOperation::Create {
            record_id: record_id.into(),
        }
    }

    pub fn update(record_id: impl Into<String>) -> Self {
        SyncOperation::Update {
            record_id: record_id.into(),
        }
    }

    pub fn delete(record_id: impl Into<String>, data: Value) -> Self {
        SyncOperation::Delete {
            record_id: record_id.into(),
            data,
        }
    }

    /// Rebuild an operation from its persisted columns
    pub fn from_parts(operation_type: &str, record_id: &str, data: Value) -> SyncResult<Self> {
        let operation = match operation_type.parse::<OperationKind>()? {
            OperationKind::Create => SyncOperation::create(record_id),
            OperationKind::Update => SyncOperation::update(record_id),
            OperationKind::Delete => SyncOperation::delete(record_id, data),
        };
        Ok(operation)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            SyncOperation::Create { .. } => OperationKind::Create,
            SyncOperation::Update { .. } => OperationKind::Update,
            SyncOperation::Delete { .. } => OperationKind::Delete,
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            SyncOperation::Create { record_id }
            | SyncOperation::Update { record_id }
            | SyncOperation::Delete { record_id, .. } => record_id,
        }
    }

    /// Delete key data; `null` for creates and updates
    pub fn data(&self) -> &Value {
        match self {
            SyncOperation::Delete { data, .. } => data,
            _ => &Value::Null,
        }
    }
}

/// What a handler achieved for one operation
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Server accepted the write and answered with one payload
    Synced(Value),
    /// Server answered with the full list of the user's rows
    SyncedMany(Vec<Value>),
    /// Server row removed
    Deleted,
    /// No server counterpart exists yet; the record was accepted locally
    NotImplemented { reason: &'static str },
}

impl SyncOutcome {
    /// Outcomes that did not reach the server
    pub fn is_placeholder(&self) -> bool {
        matches!(self, SyncOutcome::NotImplemented { .. })
    }
}

/// Capability the queue manager drives, one per entity
#[async_trait]
pub trait SyncHandler: Send + Sync {
    fn entity(&self) -> EntityKind;

    async fn sync_to_server(&self, operation: &SyncOperation) -> SyncResult<SyncOutcome>;
}

/// Per-entity create/update/delete steps
#[async_trait]
pub trait EntitySyncHandler: Send + Sync {
    const ENTITY: EntityKind;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome>;

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome>;

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome>;
}

#[async_trait]
impl<T> SyncHandler for T
where
    T: EntitySyncHandler,
{
    fn entity(&self) -> EntityKind {
        T::ENTITY
    }

    async fn sync_to_server(&self, operation: &SyncOperation) -> SyncResult<SyncOutcome> {
        tracing::debug!(
            entity = %T::ENTITY,
            operation = %operation.kind(),
            record_id = operation.record_id(),
            "Syncing local mutation"
        );
        match operation {
            SyncOperation::Create { record_id } => self.create_on_server(record_id).await,
            SyncOperation::Update { record_id } => self.update_on_server(record_id).await,
            SyncOperation::Delete { data, .. } => self.delete_from_server(data).await,
        }
    }
}

/// Local record access shared by every handler
#[derive(Clone)]
pub struct LocalRecords {
    store: Arc<dyn OfflineStore>,
    entity: EntityKind,
}

impl LocalRecords {
    pub fn new(store: Arc<dyn OfflineStore>, entity: EntityKind) -> Self {
        Self { store, entity }
    }

    /// Load the full local record; absence is fatal for the operation
    pub async fn load(&self, record_id: &str) -> SyncResult<LocalRecord> {
        self.store
            .get_by_id(self.entity, record_id)
            .await?
            .ok_or_else(|| {
                tracing::error!(entity = %self.entity, record_id, "Local record not found");
                SyncError::record_not_found(self.entity, record_id)
            })
    }

    /// Write a sync outcome against the version that was read
    pub async fn update_local_sync_status(
        &self,
        record: &LocalRecord,
        status: SyncStatus,
        update: StatusUpdate,
    ) -> SyncResult<()> {
        let write = self
            .store
            .update_sync_status(self.entity, &record.id, record.version, status, &update)
            .await?;

        match write {
            StatusWrite::Applied => {
                tracing::debug!(entity = %self.entity, record_id = %record.id, %status, "Updated local sync status");
            }
            StatusWrite::Superseded => {
                tracing::info!(
                    entity = %self.entity,
                    record_id = %record.id,
                    %status,
                    "Newer local mutation landed during sync; status left pending"
                );
            }
            StatusWrite::Missing => {
                tracing::warn!(entity = %self.entity, record_id = %record.id, %status, "Record removed during sync");
            }
        }
        Ok(())
    }

    /// Run a remote call for `record` and record its outcome locally
    pub async fn push<F, S>(&self, record: &LocalRecord, call: F, on_success: S) -> SyncResult<Value>
    where
        F: Future<Output = ApiResult> + Send,
        S: FnOnce(&Value) -> StatusUpdate + Send,
    {
        self.push_checked(record, call, |payload| Ok(on_success(payload))).await
    }

    /// Like [`push`](Self::push) for creates the server answers with a key.
    ///
    /// A response without `key` is recorded as a failed sync: later updates
    /// could not address the server row.
    pub async fn push_acknowledged<F>(&self, record: &LocalRecord, call: F, key: &'static str) -> SyncResult<Value>
    where
        F: Future<Output = ApiResult> + Send,
    {
        self.push_checked(record, call, |payload| match payload.get(key) {
            Some(id) if !id.is_null() => Ok(server_timestamps(payload).with_server_key(key, id.clone())),
            _ => Err(ApiError::Decode {
                message: format!("response carried no {}", key),
            }),
        })
        .await
    }

    async fn push_checked<F, S>(&self, record: &LocalRecord, call: F, on_success: S) -> SyncResult<Value>
    where
        F: Future<Output = ApiResult> + Send,
        S: FnOnce(&Value) -> Result<StatusUpdate, ApiError> + Send,
    {
        match call.await.and_then(|payload| on_success(&payload).map(|update| (payload, update))) {
            Ok((payload, update)) => {
                // The server already holds the write; a local failure here
                // must not send it again
                if let Err(store_err) = self
                    .update_local_sync_status(record, SyncStatus::Synced, update)
                    .await
                {
                    tracing::error!(
                        entity = %self.entity,
                        record_id = %record.id,
                        error = %store_err,
                        "Server accepted write but local status was not recorded"
                    );
                }
                tracing::info!(entity = %self.entity, record_id = %record.id, "Synced local record");
                Ok(payload)
            }
            Err(err) if err.is_conflict() => {
                tracing::warn!(entity = %self.entity, record_id = %record.id, error = %err, "Server reported conflict");
                if let Err(store_err) = self
                    .update_local_sync_status(record, SyncStatus::Conflict, StatusUpdate::conflict(err.to_string()))
                    .await
                {
                    tracing::error!(error = %store_err, "Failed to record conflict status");
                }
                Err(SyncError::Conflict {
                    entity: self.entity,
                    record_id: record.id.clone(),
                    message: err.to_string(),
                })
            }
            Err(err) => {
                tracing::warn!(entity = %self.entity, record_id = %record.id, error = %err, "Remote sync failed");
                if let Err(store_err) = self
                    .update_local_sync_status(record, SyncStatus::Failed, StatusUpdate::failed(err.to_string()))
                    .await
                {
                    tracing::error!(error = %store_err, "Failed to record failed status");
                }
                Err(err.into())
            }
        }
    }

    /// Deserialize the record payload into the entity's local shape
    pub fn parse<T: DeserializeOwned>(&self, record: &LocalRecord) -> SyncResult<T> {
        serde_json::from_value(record.data.clone())
            .map_err(|e| SyncError::invalid_record(self.entity, &record.id, e.to_string()))
    }
}

/// Read a required delete key (string or integer) from operation data
pub fn require_key(entity: EntityKind, data: &Value, field: &'static str) -> SyncResult<String> {
    let value = match data.get(field) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    };
    value.ok_or_else(|| {
        tracing::error!(%entity, field, "Delete is missing a required key");
        SyncError::missing_delete_key(entity, field)
    })
}

/// Server timestamps from a response payload
pub fn server_timestamps(payload: &Value) -> StatusUpdate {
    let read = |pascal: &str, camel: &str| {
        payload
            .get(pascal)
            .or_else(|| payload.get(camel))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    StatusUpdate::default().with_server_timestamps(
        read("CreatedAt", "createdAt"),
        read("UpdatedAt", "updatedAt"),
    )
}

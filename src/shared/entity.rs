//! Local mutation records and their sync bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The entity types that have a sync handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    BodyMeasurement,
    ExerciseSetModification,
    ExerciseSubstitution,
    MacroTarget,
    NutritionGoal,
    NutritionProfile,
    ProgramProgress,
}

impl EntityKind {
    /// Every entity kind, in registry order
    pub const ALL: [EntityKind; 7] = [
        EntityKind::BodyMeasurement,
        EntityKind::ExerciseSetModification,
        EntityKind::ExerciseSubstitution,
        EntityKind::MacroTarget,
        EntityKind::NutritionGoal,
        EntityKind::NutritionProfile,
        EntityKind::ProgramProgress,
    ];

    /// Stable name used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::BodyMeasurement => "body_measurement",
            EntityKind::ExerciseSetModification => "exercise_set_modification",
            EntityKind::ExerciseSubstitution => "exercise_substitution",
            EntityKind::MacroTarget => "macro_target",
            EntityKind::NutritionGoal => "nutrition_goal",
            EntityKind::NutritionProfile => "nutrition_profile",
            EntityKind::ProgramProgress => "program_progress",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind: {}", s))
    }
}

/// Sync state of a local record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local mutation not yet acknowledged by the server
    Pending,
    /// Server holds the local state
    Synced,
    /// Last attempt failed and may be retried
    Failed,
    /// Server rejected the write; needs a new local mutation
    Conflict,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Conflict => "conflict",
        }
    }

    /// Synced and conflicting records wait for a new local mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Synced | SyncStatus::Conflict)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            "conflict" => Ok(SyncStatus::Conflict),
            other => Err(format!("unknown sync status: {}", other)),
        }
    }
}

/// A locally persisted mutation awaiting (or past) sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Stable local identifier, never reused
    pub id: String,
    /// Entity the record belongs to
    pub entity: EntityKind,
    /// Owning user
    pub user_id: String,
    /// Entity payload as currently known locally
    pub data: Value,
    /// Current sync status
    pub sync_status: SyncStatus,
    /// Last failure message
    pub last_error: Option<String>,
    /// Number of failed attempts
    pub retry_count: u32,
    /// Server creation timestamp once synced
    pub server_created_at: Option<String>,
    /// Server update timestamp once synced
    pub server_updated_at: Option<String>,
    /// Bumped on every local mutation
    pub version: i64,
}

impl LocalRecord {
    /// Apply a status write to the record in place.
    ///
    /// Server-assigned keys are merged into `data` so later updates can
    /// address the server row.
    pub fn apply_status_update(&mut self, status: SyncStatus, update: &StatusUpdate) {
        self.sync_status = status;
        if update.increment_retry {
            self.retry_count += 1;
        }
        match status {
            SyncStatus::Synced => self.last_error = None,
            _ => {
                if update.error_message.is_some() {
                    self.last_error = update.error_message.clone();
                }
            }
        }
        self.apply_server_fields(update);
    }

    /// Merge server timestamps and the server-assigned key, leaving the
    /// status alone.
    ///
    /// Used on its own when a newer local mutation superseded the write: the
    /// server row still exists and later updates need its key.
    pub fn apply_server_fields(&mut self, update: &StatusUpdate) {
        if update.server_created_at.is_some() {
            self.server_created_at = update.server_created_at.clone();
        }
        if update.server_updated_at.is_some() {
            self.server_updated_at = update.server_updated_at.clone();
        }
        if let Some((field, value)) = &update.server_key {
            if let Value::Object(map) = &mut self.data {
                map.insert((*field).to_string(), value.clone());
            }
        }
    }
}

/// Merge a new local payload over the stored one.
///
/// Keys absent from `incoming` survive, so server-assigned ids recorded by an
/// earlier sync are not lost when the UI writes a partial payload.
pub fn merge_payload(existing: &Value, incoming: Value) -> Value {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(next)) => {
            let mut merged = current.clone();
            for (key, value) in next {
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (_, incoming) => incoming,
    }
}

/// Options accompanying a sync status write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub error_message: Option<String>,
    pub increment_retry: bool,
    pub server_created_at: Option<String>,
    pub server_updated_at: Option<String>,
    /// Server-assigned key to merge into the record payload
    pub server_key: Option<(&'static str, Value)>,
}

impl StatusUpdate {
    /// Status options for a retryable failure
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            increment_retry: true,
            ..Self::default()
        }
    }

    /// Status options for a conflict reported by the server
    pub fn conflict(error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }

    pub fn with_server_timestamps(
        mut self,
        created_at: Option<String>,
        updated_at: Option<String>,
    ) -> Self {
        self.server_created_at = created_at;
        self.server_updated_at = updated_at;
        self
    }

    pub fn with_server_key(mut self, field: &'static str, value: Value) -> Self {
        self.server_key = Some((field, value));
        self
    }

    /// Whether the update carries anything the server assigned
    pub fn has_server_fields(&self) -> bool {
        self.server_key.is_some() || self.server_created_at.is_some() || self.server_updated_at.is_some()
    }
}

/// Result of a compare-and-swap status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    /// The status was written
    Applied,
    /// A newer local mutation landed since the record was read; the status
    /// was left alone and only server fields were merged
    Superseded,
    /// The record no longer exists
    Missing,
}

//! # Operation Queue
//!
//! In-memory queue of sync operations waiting to reach the server.
//!
//! ## Ordering
//!
//! Operations are kept in `sequence` order. Only the oldest operation of each
//! `(entity, record_id)` is eligible to run, and only while nothing else for
//! that record is in flight, so one record's operations reach its handler
//! one at a time and in the order they were queued. Different records run
//! independently.
//!
//! ## Persisted form
//!
//! [`OperationRecord`] is the flat row written to the journal. It keeps the
//! raw operation tag so rows that no longer parse can still be listed as
//! dead letters.

use crate::handlers::SyncOperation;
use crate::shared::{EntityKind, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Execution state of a queued operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OperationStatus {
    /// Waiting for its first attempt
    Pending,
    /// Handed to a handler
    InProgress,
    /// Failed at least once; waiting for `next_attempt_at`
    Retrying,
}

/// A sync operation with its queue bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: Uuid,
    /// Enqueue order, strictly increasing
    pub sequence: u64,
    pub entity: EntityKind,
    pub operation: SyncOperation,
    pub status: OperationStatus,
    /// Failed attempts so far
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueuedOperation {
    pub fn record_key(&self) -> (EntityKind, &str) {
        (self.entity, self.operation.record_id())
    }

    /// Flatten into the journal row
    pub fn to_record(&self) -> OperationRecord {
        OperationRecord {
            id: self.id,
            sequence: self.sequence,
            entity: self.entity.as_str().to_string(),
            record_id: self.operation.record_id().to_string(),
            operation_type: self.operation.kind().as_str().to_string(),
            data: self.operation.data().clone(),
            queued_at: self.queued_at,
            attempts: self.attempts,
            next_attempt_at: self.next_attempt_at,
            last_attempt: self.last_attempt,
            last_error: self.last_error.clone(),
            dead_lettered: false,
        }
    }
}

/// Journal row for a queued or dead-lettered operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub sequence: u64,
    pub entity: String,
    pub record_id: String,
    pub operation_type: String,
    pub data: Value,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub dead_lettered: bool,
}

impl OperationRecord {
    /// Rebuild the live operation; fails for unknown entities or tags
    pub fn to_queued(&self) -> SyncResult<QueuedOperation> {
        let entity = self
            .entity
            .parse::<EntityKind>()
            .map_err(crate::shared::SyncError::unknown_operation)?;
        let operation = SyncOperation::from_parts(&self.operation_type, &self.record_id, self.data.clone())?;

        Ok(QueuedOperation {
            id: self.id,
            sequence: self.sequence,
            entity,
            operation,
            status: if self.attempts == 0 {
                OperationStatus::Pending
            } else {
                OperationStatus::Retrying
            },
            attempts: self.attempts,
            queued_at: self.queued_at,
            next_attempt_at: self.next_attempt_at,
            last_attempt: self.last_attempt,
            last_error: self.last_error.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct QueueState {
    operations: VecDeque<QueuedOperation>,
    dead_letters: Vec<OperationRecord>,
    next_sequence: u64,
}

/// Operation queue with per-record single flight
#[derive(Debug, Default)]
pub struct OperationQueue {
    state: RwLock<QueueState>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new operation at the tail
    pub async fn push(&self, entity: EntityKind, operation: SyncOperation) -> QueuedOperation {
        let queued = self.allocate(entity, operation).await;
        self.restore(queued.clone()).await;
        queued
    }

    /// Build the next operation without making it visible to [`take_due`].
    ///
    /// The caller inserts it with [`restore`] once it is durable. A sequence
    /// that is never inserted only leaves a gap.
    ///
    /// [`take_due`]: Self::take_due
    /// [`restore`]: Self::restore
    pub async fn allocate(&self, entity: EntityKind, operation: SyncOperation) -> QueuedOperation {
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.next_sequence += 1;

        QueuedOperation {
            id: Uuid::new_v4(),
            sequence: state.next_sequence,
            entity,
            operation,
            status: OperationStatus::Pending,
            attempts: 0,
            queued_at: now,
            next_attempt_at: now,
            last_attempt: None,
            last_error: None,
        }
    }

    /// Whether `id` is live or dead-lettered
    pub async fn contains(&self, id: Uuid) -> bool {
        let state = self.state.read().await;
        state.operations.iter().any(|op| op.id == id) || state.dead_letters.iter().any(|record| record.id == id)
    }

    /// Insert an operation loaded from the journal, keeping sequence order
    pub async fn restore(&self, operation: QueuedOperation) {
        let mut state = self.state.write().await;
        state.next_sequence = state.next_sequence.max(operation.sequence);
        let position = state
            .operations
            .iter()
            .position(|op| op.sequence > operation.sequence)
            .unwrap_or(state.operations.len());
        state.operations.insert(position, operation);
    }

    /// Park a journal row as a dead letter
    pub async fn restore_dead_letter(&self, record: OperationRecord) {
        let mut state = self.state.write().await;
        state.next_sequence = state.next_sequence.max(record.sequence);
        state.dead_letters.push(record);
    }

    /// Claim every record head that is due and not in flight.
    ///
    /// Claimed operations are marked `InProgress` until completed,
    /// rescheduled or dead-lettered.
    pub async fn take_due(&self, now: DateTime<Utc>) -> Vec<QueuedOperation> {
        let mut state = self.state.write().await;
        let mut seen: HashSet<(EntityKind, String)> = HashSet::new();
        let mut due = Vec::new();

        for op in state.operations.iter_mut() {
            let key = (op.entity, op.operation.record_id().to_string());
            if !seen.insert(key) {
                continue;
            }
            if op.status == OperationStatus::InProgress || op.next_attempt_at > now {
                continue;
            }
            op.status = OperationStatus::InProgress;
            op.last_attempt = Some(now);
            due.push(op.clone());
        }
        due
    }

    /// Remove a finished operation
    pub async fn complete(&self, id: Uuid) -> Option<QueuedOperation> {
        let mut state = self.state.write().await;
        let position = state.operations.iter().position(|op| op.id == id)?;
        state.operations.remove(position)
    }

    /// Record a failed attempt and schedule the next one
    pub async fn reschedule(
        &self,
        id: Uuid,
        error: String,
        next_attempt_at: DateTime<Utc>,
    ) -> Option<QueuedOperation> {
        let mut state = self.state.write().await;
        let op = state.operations.iter_mut().find(|op| op.id == id)?;
        op.status = OperationStatus::Retrying;
        op.attempts += 1;
        op.last_error = Some(error);
        op.next_attempt_at = next_attempt_at;
        Some(op.clone())
    }

    /// Move an operation out of the live queue into the dead letters
    pub async fn dead_letter(&self, id: Uuid, error: String, attempts: u32) -> Option<OperationRecord> {
        let mut state = self.state.write().await;
        let position = state.operations.iter().position(|op| op.id == id)?;
        let op = state.operations.remove(position)?;

        let mut record = op.to_record();
        record.attempts = attempts;
        record.last_error = Some(error);
        record.dead_lettered = true;
        state.dead_letters.push(record.clone());
        Some(record)
    }

    /// Take a dead letter back out, re-sequenced at the tail
    pub async fn take_dead_letter(&self, id: Uuid) -> Option<OperationRecord> {
        let mut state = self.state.write().await;
        let position = state.dead_letters.iter().position(|record| record.id == id)?;
        let mut record = state.dead_letters.remove(position);
        state.next_sequence += 1;
        record.sequence = state.next_sequence;
        Some(record)
    }

    pub async fn dead_letters(&self) -> Vec<OperationRecord> {
        self.state.read().await.dead_letters.clone()
    }

    /// Live operations in sequence order
    pub async fn snapshot(&self) -> Vec<QueuedOperation> {
        self.state.read().await.operations.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.operations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.operations.is_empty()
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.state.read().await;

        let mut stats = QueueStats {
            total_operations: state.operations.len(),
            dead_lettered: state.dead_letters.len(),
            ..QueueStats::default()
        };
        for op in state.operations.iter() {
            match op.status {
                OperationStatus::Pending => stats.pending += 1,
                OperationStatus::InProgress => stats.in_progress += 1,
                OperationStatus::Retrying => stats.retrying += 1,
            }
        }
        stats
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Live operations in the queue
    pub total_operations: usize,
    /// Operations not yet attempted
    pub pending: usize,
    /// Operations handed to a handler
    pub in_progress: usize,
    /// Operations waiting out a backoff
    pub retrying: usize,
    /// Operations parked after a fatal error or too many attempts
    pub dead_lettered: usize,
}

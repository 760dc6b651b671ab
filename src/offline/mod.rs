//! # Sync Queue Manager
//!
//! Owns the queue of local mutations waiting to reach the server and drives
//! the entity handlers that push them.
//!
//! ## Architecture
//!
//! - **Operation Queue** (`queue.rs`): sequence-ordered operations with
//!   per-record single flight
//! - **Retry Policy** (`retry.rs`): backoff and the attempt budget
//! - **Journal** ([`QueueJournal`]): durable copy of the queue so operations
//!   survive a restart
//! - **Handler Registry**: routes each operation to its entity handler
//!
//! ## Outcomes
//!
//! | Handler result | Queue action |
//! |---|---|
//! | success / placeholder | removed |
//! | conflict | removed, counted |
//! | retryable error | rescheduled with backoff; dead-lettered once the budget is spent |
//! | any other error | dead-lettered immediately |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fitsync::api::ApiClient;
//! use fitsync::handlers::{HandlerRegistry, SyncOperation};
//! use fitsync::local_db::LocalDatabase;
//! use fitsync::offline::SyncQueueManager;
//! use fitsync::shared::{AppConfig, EntityKind};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let db = Arc::new(LocalDatabase::in_memory().await?);
//! let api = Arc::new(ApiClient::new(&config)?);
//! let registry = HandlerRegistry::with_defaults(db.clone(), api);
//!
//! let manager = SyncQueueManager::from_config(registry, &config.sync).with_journal(db);
//! manager.restore().await?;
//! manager.enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1")).await?;
//! let report = manager.process_due().await;
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod retry;

pub use queue::{OperationQueue, OperationRecord, OperationStatus, QueueStats, QueuedOperation};
pub use retry::{BackoffStrategy, RetryPolicy};

use crate::handlers::{HandlerRegistry, SyncOperation, SyncOutcome};
use crate::shared::{EntityKind, StoreError, SyncConfig, SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Durable storage for queued and dead-lettered operations
#[async_trait]
pub trait QueueJournal: Send + Sync {
    /// Insert or replace a row
    async fn save(&self, record: &OperationRecord) -> Result<(), StoreError>;

    async fn remove(&self, id: Uuid) -> Result<(), StoreError>;

    /// Every row, live and dead-lettered, in sequence order
    async fn load(&self) -> Result<Vec<OperationRecord>, StoreError>;
}

/// Counts from one processing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Operations handed to a handler
    pub attempted: usize,
    /// Operations the server accepted
    pub synced: usize,
    /// Operations accepted locally without a server counterpart
    pub not_implemented: usize,
    /// Operations rescheduled after a retryable failure
    pub retried: usize,
    /// Operations moved to the dead letters
    pub dead_lettered: usize,
    /// Operations dropped after a server conflict
    pub conflicts: usize,
}

impl ProcessReport {
    pub fn merge(&mut self, other: ProcessReport) {
        self.attempted += other.attempted;
        self.synced += other.synced;
        self.not_implemented += other.not_implemented;
        self.retried += other.retried;
        self.dead_lettered += other.dead_lettered;
        self.conflicts += other.conflicts;
    }

    /// Operations that left the live queue
    pub fn settled(&self) -> usize {
        self.synced + self.not_implemented + self.dead_lettered + self.conflicts
    }
}

/// Drives queued operations through their handlers
pub struct SyncQueueManager {
    registry: HandlerRegistry,
    queue: OperationQueue,
    journal: Option<Arc<dyn QueueJournal>>,
    policy: RetryPolicy,
    max_concurrent_ops: usize,
    /// Serializes enqueues so operations become visible in sequence order
    enqueue_lock: Mutex<()>,
}

impl SyncQueueManager {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            queue: OperationQueue::new(),
            journal: None,
            policy: RetryPolicy::default(),
            max_concurrent_ops: 5,
            enqueue_lock: Mutex::new(()),
        }
    }

    pub fn from_config(registry: HandlerRegistry, config: &SyncConfig) -> Self {
        Self::new(registry)
            .with_policy(RetryPolicy::from_config(config))
            .with_max_concurrent_ops(config.max_concurrent_ops)
    }

    pub fn with_journal(mut self, journal: Arc<dyn QueueJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_concurrent_ops(mut self, max_concurrent_ops: usize) -> Self {
        self.max_concurrent_ops = max_concurrent_ops.max(1);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Queue a local mutation for sync.
    ///
    /// The operation is journaled before any pass can see it; if the journal
    /// write fails nothing is queued.
    pub async fn enqueue(&self, entity: EntityKind, operation: SyncOperation) -> SyncResult<QueuedOperation> {
        let _guard = self.enqueue_lock.lock().await;
        let queued = self.queue.allocate(entity, operation).await;
        if let Some(journal) = &self.journal {
            journal.save(&queued.to_record()).await?;
        }
        self.queue.restore(queued.clone()).await;

        tracing::debug!(
            id = %queued.id,
            sequence = queued.sequence,
            %entity,
            operation = %queued.operation.kind(),
            record_id = queued.operation.record_id(),
            "Queued sync operation"
        );
        Ok(queued)
    }

    /// Reload journaled operations; returns how many live operations came back.
    ///
    /// Rows already in memory are skipped, so calling it again is a no-op.
    pub async fn restore(&self) -> SyncResult<usize> {
        let Some(journal) = &self.journal else {
            return Ok(0);
        };

        let mut restored = 0;
        for mut record in journal.load().await? {
            if self.queue.contains(record.id).await {
                continue;
            }
            if record.dead_lettered {
                self.queue.restore_dead_letter(record).await;
                continue;
            }
            match record.to_queued() {
                Ok(operation) => {
                    self.queue.restore(operation).await;
                    restored += 1;
                }
                Err(e) => {
                    tracing::error!(id = %record.id, operation = %record.operation_type, error = %e, "Dead-lettering unreadable operation");
                    record.dead_lettered = true;
                    record.last_error = Some(e.to_string());
                    self.journal_save(&record).await;
                    self.queue.restore_dead_letter(record).await;
                }
            }
        }

        tracing::info!(restored, "Restored sync queue");
        Ok(restored)
    }

    /// Run one pass over the operations that are due now
    pub async fn process_due(&self) -> ProcessReport {
        self.process_due_at(Utc::now()).await
    }

    /// Run one pass as of `now`.
    ///
    /// Each record contributes at most its oldest operation; up to
    /// `max_concurrent_ops` handlers run at once.
    pub async fn process_due_at(&self, now: DateTime<Utc>) -> ProcessReport {
        let due = self.queue.take_due(now).await;
        let mut report = ProcessReport {
            attempted: due.len(),
            ..ProcessReport::default()
        };
        if due.is_empty() {
            return report;
        }
        tracing::debug!(count = due.len(), "Processing due sync operations");

        let registry = &self.registry;
        let mut results = stream::iter(due)
            .map(|op| async move {
                let result = registry.dispatch(op.entity, &op.operation).await;
                (op, result)
            })
            .buffer_unordered(self.max_concurrent_ops);

        while let Some((op, result)) = results.next().await {
            self.settle(op, result, now, &mut report).await;
        }

        tracing::info!(
            attempted = report.attempted,
            synced = report.synced,
            retried = report.retried,
            dead_lettered = report.dead_lettered,
            conflicts = report.conflicts,
            "Sync pass finished"
        );
        report
    }

    async fn settle(
        &self,
        op: QueuedOperation,
        result: SyncResult<SyncOutcome>,
        now: DateTime<Utc>,
        report: &mut ProcessReport,
    ) {
        match result {
            Ok(outcome) => {
                self.queue.complete(op.id).await;
                self.journal_remove(op.id).await;
                if let SyncOutcome::NotImplemented { reason } = outcome {
                    tracing::warn!(id = %op.id, entity = %op.entity, reason, "Operation accepted without server sync");
                    report.not_implemented += 1;
                } else {
                    report.synced += 1;
                }
            }
            Err(e) if e.is_terminal() => {
                tracing::warn!(id = %op.id, entity = %op.entity, error = %e, "Dropping conflicted operation");
                self.queue.complete(op.id).await;
                self.journal_remove(op.id).await;
                report.conflicts += 1;
            }
            Err(e) if e.is_retryable() => {
                let attempts = op.attempts + 1;
                if self.policy.is_exhausted(attempts) {
                    self.dead_letter(&op, &e, attempts, report).await;
                    return;
                }
                let next_attempt_at = self.policy.next_attempt_at(now, attempts);
                tracing::warn!(
                    id = %op.id,
                    entity = %op.entity,
                    attempts,
                    %next_attempt_at,
                    error = %e,
                    "Sync attempt failed; retrying later"
                );
                if let Some(updated) = self.queue.reschedule(op.id, e.to_string(), next_attempt_at).await {
                    self.journal_save(&updated.to_record()).await;
                }
                report.retried += 1;
            }
            Err(e) => self.dead_letter(&op, &e, op.attempts, report).await,
        }
    }

    async fn dead_letter(&self, op: &QueuedOperation, error: &SyncError, attempts: u32, report: &mut ProcessReport) {
        tracing::error!(
            id = %op.id,
            entity = %op.entity,
            record_id = op.operation.record_id(),
            attempts,
            error = %error,
            "Dead-lettering sync operation"
        );
        if let Some(record) = self.queue.dead_letter(op.id, error.to_string(), attempts).await {
            self.journal_save(&record).await;
        }
        report.dead_lettered += 1;
    }

    pub async fn stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    pub async fn dead_letters(&self) -> Vec<OperationRecord> {
        self.queue.dead_letters().await
    }

    /// Live operations in sequence order
    pub async fn pending(&self) -> Vec<QueuedOperation> {
        self.queue.snapshot().await
    }

    /// Move a dead letter back to the tail of the queue with a fresh budget.
    ///
    /// Returns `Ok(None)` when no dead letter has that id. Rows whose
    /// operation still cannot be parsed stay dead-lettered.
    pub async fn retry_dead_letter(&self, id: Uuid) -> SyncResult<Option<QueuedOperation>> {
        let Some(record) = self.queue.take_dead_letter(id).await else {
            return Ok(None);
        };

        let mut operation = match record.to_queued() {
            Ok(operation) => operation,
            Err(e) => {
                self.queue.restore_dead_letter(record).await;
                return Err(e);
            }
        };
        operation.status = OperationStatus::Pending;
        operation.attempts = 0;
        operation.last_error = None;
        operation.next_attempt_at = Utc::now();

        self.journal_save(&operation.to_record()).await;
        self.queue.restore(operation.clone()).await;
        tracing::info!(%id, sequence = operation.sequence, "Re-queued dead letter");
        Ok(Some(operation))
    }

    async fn journal_save(&self, record: &OperationRecord) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.save(record).await {
                tracing::warn!(id = %record.id, error = %e, "Failed to journal sync operation");
            }
        }
    }

    async fn journal_remove(&self, id: Uuid) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.remove(id).await {
                tracing::warn!(%id, error = %e, "Failed to remove journaled operation");
            }
        }
    }
}

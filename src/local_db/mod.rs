//! # Local Offline Store
//!
//! Local-first persistence for mutation records and the sync queue.
//!
//! ## Architecture
//!
//! Every entity's records live in one table keyed by `(entity, id)`:
//! - **Local Records**: payload, owner, sync status, retry bookkeeping and a
//!   `version` bumped by each local mutation
//! - **Offline Queue**: journaled sync operations, see [`crate::offline`]
//! - **Sync Metadata**: small key/value table for sync timestamps
//!
//! Status writes are compare-and-swap on `version`: a handler that read
//! version N can only write the outcome while the record is still at N.
//!
//! ## Key Components
//!
//! - [`OfflineStore`]: the store contract used by sync handlers
//! - [`LocalDatabase`]: SQLite implementation (`records.rs`, `sync.rs`)
//! - [`MemoryStore`]: in-process implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fitsync::local_db::{LocalDatabase, OfflineStore};
//! use fitsync::shared::EntityKind;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fitsync::shared::StoreError> {
//! let db = LocalDatabase::in_memory().await?;
//! db.save_local_mutation(EntityKind::BodyMeasurement, "bm1", "u1", json!({ "waist": 80 }))
//!     .await?;
//! let record = db.get_by_id(EntityKind::BodyMeasurement, "bm1").await?;
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod records;
pub mod schema;
pub mod sync;

pub use memory::MemoryStore;

use crate::shared::{EntityKind, LocalRecord, StatusUpdate, StatusWrite, StoreError, SyncStatus};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Result type for local store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Per-entity record store consulted by the sync handlers
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Load a record by id
    async fn get_by_id(&self, entity: EntityKind, record_id: &str) -> Result<Option<LocalRecord>>;

    /// Write a sync outcome if the record is still at `expected_version`.
    ///
    /// A stale version leaves the status untouched but still merges server
    /// keys and timestamps, since the server row exists either way.
    async fn update_sync_status(
        &self,
        entity: EntityKind,
        record_id: &str,
        expected_version: i64,
        status: SyncStatus,
        update: &StatusUpdate,
    ) -> Result<StatusWrite>;

    /// Record a new local mutation: merges the payload, resets the record to
    /// `pending` and bumps its version
    async fn save_local_mutation(
        &self,
        entity: EntityKind,
        record_id: &str,
        user_id: &str,
        data: Value,
    ) -> Result<LocalRecord>;

    /// Remove a record; returns whether it existed
    async fn delete_record(&self, entity: EntityKind, record_id: &str) -> Result<bool>;

    /// Records of one entity in a given status
    async fn list_by_status(&self, entity: EntityKind, status: SyncStatus) -> Result<Vec<LocalRecord>>;
}

/// SQLite-backed local store
///
/// Manages the connection pool, schema and migrations. The record and queue
/// operations are implemented in `records.rs` and `sync.rs`.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode for better concurrency between the UI writer and the
    /// sync worker.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePool::connect(&database_url).await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        sqlx::query("PRAGMA temp_store=MEMORY").execute(&pool).await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::info!(path = %path.display(), "Opened local database");
        Ok(db)
    }

    /// Open a private in-memory database
    ///
    /// A single connection keeps every query on the same in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Create all tables and run pending migrations
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;

        self.run_migrations().await
    }

    /// Checks the current schema version and applies any pending migrations
    async fn run_migrations(&self) -> Result<()> {
        let current_version: (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        for migration in schema::pending(current_version.0) {
            tracing::debug!(
                version = migration.version,
                description = migration.description,
                "Applying local schema migration"
            );
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(migration.version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record and queue counts for diagnostics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let pending_records: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM local_records WHERE sync_status IN ('pending', 'failed')")
                .fetch_one(&self.pool)
                .await?;

        let conflicted_records: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM local_records WHERE sync_status = 'conflict'")
                .fetch_one(&self.pool)
                .await?;

        let queued_operations: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM offline_queue WHERE dead_lettered = 0")
                .fetch_one(&self.pool)
                .await?;

        let dead_letters: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM offline_queue WHERE dead_lettered = 1")
                .fetch_one(&self.pool)
                .await?;

        Ok(DatabaseStats {
            pending_records: pending_records.0 as u64,
            conflicted_records: conflicted_records.0 as u64,
            queued_operations: queued_operations.0 as u64,
            dead_letters: dead_letters.0 as u64,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Records waiting for a successful sync
    pub pending_records: u64,
    /// Records the server rejected as conflicting
    pub conflicted_records: u64,
    /// Live operations in the offline queue
    pub queued_operations: u64,
    /// Operations parked after exhausting retries
    pub dead_letters: u64,
}

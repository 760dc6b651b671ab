//! fitsync - Main Library
//!
//! fitsync is the offline write path of a fitness and nutrition tracking
//! client. Mutations are saved locally first, queued, and pushed to the
//! server by one handler per entity once connectivity allows.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used across the crate
//!   - Entity kinds, local records and sync statuses
//!   - Error types
//!   - Configuration
//!
//! - **`local_db`** - SQLite offline store
//!   - Local mutation records with compare-and-swap status writes
//!   - Offline queue journal and sync metadata
//!
//! - **`api`** - Remote entity services and the reqwest client
//!
//! - **`handlers`** - Per-entity sync handlers and the handler registry
//!
//! - **`offline`** - Operation queue, retry policy and the queue manager
//!
//! - **`sync`** - Background sync service, sync state and metrics
//!
//! # Usage
//!
//! ```rust,no_run
//! use fitsync::api::ApiClient;
//! use fitsync::handlers::{HandlerRegistry, SyncOperation};
//! use fitsync::local_db::{LocalDatabase, OfflineStore};
//! use fitsync::offline::SyncQueueManager;
//! use fitsync::shared::{AppConfig, EntityKind};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! let db = Arc::new(LocalDatabase::open(config.database_path()).await?);
//! let api = Arc::new(ApiClient::new(&config)?);
//! let manager = SyncQueueManager::from_config(HandlerRegistry::with_defaults(db.clone(), api), &config.sync)
//!     .with_journal(db.clone());
//!
//! db.save_local_mutation(
//!     EntityKind::BodyMeasurement,
//!     "bm1",
//!     "u1",
//!     json!({ "MeasurementTimestamp": "2024-01-01T00:00:00Z", "waist": 80 }),
//! )
//! .await?;
//! manager.enqueue(EntityKind::BodyMeasurement, SyncOperation::create("bm1")).await?;
//! manager.process_due().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - Queue and service state sit behind `tokio::sync::RwLock`
//! - Handlers, stores and API clients are shared as `Arc<dyn Trait>`
//! - One operation per record is in flight at a time
//!
//! # Error Handling
//!
//! - `SyncError` for handler and queue failures; `is_retryable` drives retries
//! - `StoreError`, `ApiError` and `ConfigError` for the layers beneath

/// Shared types and data structures
pub mod shared;

/// Local SQLite store
pub mod local_db;

/// Remote entity services
pub mod api;

/// Per-entity sync handlers
pub mod handlers;

/// Offline operation queue
pub mod offline;

/// Background sync service
pub mod sync;

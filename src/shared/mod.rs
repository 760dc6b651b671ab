//! Shared Module
//!
//! Types used by every layer of the sync engine: the local record model,
//! the error taxonomy and application configuration.

/// Local mutation records and sync bookkeeping
pub mod entity;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use entity::{EntityKind, LocalRecord, StatusUpdate, StatusWrite, SyncStatus};
pub use error::{ApiError, StoreError, SyncError, SyncResult};
pub use config::{AppConfig, AppConfigBuilder, ConfigError, SyncConfig};

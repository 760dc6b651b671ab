//! Shared Error Types
//!
//! This module defines the error taxonomy used across the sync engine.
//!
//! # Error Categories
//!
//! - `SyncError` - Failures while pushing a queued mutation to the server
//! - `StoreError` - Local offline store failures (SQLite, JSON columns)
//! - `ApiError` - Remote entity service failures (transport, HTTP status, decoding)
//!
//! `SyncError` is split into three groups that the queue manager acts on:
//!
//! - **Fatal**: caller or sequencing defects (unknown operation, orphaned record,
//!   missing delete keys, update before the server id is known). Never retried.
//! - **Terminal**: the server reported a conflict. The record is marked
//!   `conflict` and the operation is dropped from the queue.
//! - **Retryable**: transport failures, error statuses other than 409, and
//!   local store failures. A request that could not be built or a response
//!   that could not be decoded is fatal.
//!
//! # Usage
//!
//! ```rust
//! use fitsync::shared::error::SyncError;
//! use fitsync::shared::EntityKind;
//!
//! let error = SyncError::record_not_found(EntityKind::BodyMeasurement, "bm1");
//! assert!(!error.is_retryable());
//! ```
use crate::shared::entity::EntityKind;
use thiserror::Error;

/// Result alias for handler and queue operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while syncing a local mutation to the server
#[derive(Debug, Error)]
pub enum SyncError {
    /// Persisted operation tag does not name a known operation
    #[error("Unknown sync operation: {operation}")]
    UnknownOperation {
        /// The unrecognized operation tag
        operation: String,
    },

    /// Local record referenced by the operation no longer exists
    #[error("Local {entity} record not found: {record_id}")]
    RecordNotFound {
        /// Entity the record belongs to
        entity: EntityKind,
        /// Local record id
        record_id: String,
    },

    /// Delete payload lacks one of the entity's natural key fields
    #[error("Missing required data for {entity} delete: {field}")]
    MissingDeleteKey {
        /// Entity being deleted
        entity: EntityKind,
        /// Name of the missing field
        field: &'static str,
    },

    /// Update attempted before the create sync assigned a server id
    #[error("Cannot update {entity} record {record_id} without server id")]
    MissingServerId {
        /// Entity being updated
        entity: EntityKind,
        /// Local record id
        record_id: String,
    },

    /// Program progress create on a record that is not a fresh start
    #[error("Creation for existing progress not supported: {record_id}")]
    UnsupportedCreate {
        /// Local record id
        record_id: String,
    },

    /// Local record payload could not be turned into a server request
    #[error("Invalid {entity} record {record_id}: {message}")]
    InvalidRecord {
        /// Entity the record belongs to
        entity: EntityKind,
        /// Local record id
        record_id: String,
        /// What was wrong with the payload
        message: String,
    },

    /// No handler was registered for the entity
    #[error("No sync handler registered for {entity}")]
    HandlerNotRegistered {
        /// Entity without a handler
        entity: EntityKind,
    },

    /// Server rejected the write as conflicting with its state
    #[error("Conflict syncing {entity} record {record_id}: {message}")]
    Conflict {
        /// Entity the record belongs to
        entity: EntityKind,
        /// Local record id
        record_id: String,
        /// Server supplied message
        message: String,
    },

    /// Remote entity service failure
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// Local offline store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Create a new unknown operation error
    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    /// Create a new record not found error
    pub fn record_not_found(entity: EntityKind, record_id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            entity,
            record_id: record_id.into(),
        }
    }

    /// Create a new missing delete key error
    pub fn missing_delete_key(entity: EntityKind, field: &'static str) -> Self {
        Self::MissingDeleteKey { entity, field }
    }

    /// Create a new missing server id error
    pub fn missing_server_id(entity: EntityKind, record_id: impl Into<String>) -> Self {
        Self::MissingServerId {
            entity,
            record_id: record_id.into(),
        }
    }

    /// Create a new invalid record error
    pub fn invalid_record(
        entity: EntityKind,
        record_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            entity,
            record_id: record_id.into(),
            message: message.into(),
        }
    }

    /// Whether the queue manager should schedule another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => err.is_retryable(),
            Self::Store(_) => true,
            _ => false,
        }
    }

    /// Whether the error ends the operation without dead-lettering it
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised by the local offline store
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted
    #[error("Corrupt row {id}: {message}")]
    Corrupt {
        /// Row id
        id: String,
        /// What was wrong with the row
        message: String,
    },

    /// Database directory could not be created
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the remote entity services
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// Request never produced a response
    #[error("Network error: {message}")]
    Network {
        /// Transport error message
        message: String,
    },

    /// Server answered with a non-success status
    #[error("Request failed: {status} - {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Response body was not the expected JSON
    #[error("Failed to parse response: {message}")]
    Decode {
        /// Decoder error message
        message: String,
    },

    /// Request could not be built (bad base URL or path)
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request
        message: String,
    },
}

impl ApiError {
    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// A request that cannot be built fails the same way every time, and an
    /// undecodable answer means the server already acted on the write.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Status { .. })
    }

    /// Whether the server reported a conflicting write (HTTP 409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
            }
        } else {
            Self::network(err.to_string())
        }
    }
}

//! Database fixtures
//!
//! File-backed SQLite stores in a temporary directory, so a test can close a
//! store and open it again like a restarted client would.

use fitsync::local_db::{LocalDatabase, OfflineStore};
use fitsync::shared::{EntityKind, LocalRecord};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const USER: &str = "u1";
pub const MEASURED_AT: &str = "2024-01-01T00:00:00Z";

/// A database file that lives as long as the fixture
pub struct TestDatabase {
    _dir: TempDir,
    path: PathBuf,
}

impl TestDatabase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("local.db");
        Self { _dir: dir, path }
    }

    /// Open a fresh connection pool on the file
    pub async fn open(&self) -> Arc<LocalDatabase> {
        Arc::new(
            LocalDatabase::open(&self.path)
                .await
                .expect("Failed to open test database"),
        )
    }
}

pub async fn save(db: &LocalDatabase, entity: EntityKind, id: &str, data: Value) -> LocalRecord {
    db.save_local_mutation(entity, id, USER, data)
        .await
        .expect("Failed to save local mutation")
}

pub async fn seed_measurement(db: &LocalDatabase, id: &str) -> LocalRecord {
    save(
        db,
        EntityKind::BodyMeasurement,
        id,
        json!({ "MeasurementTimestamp": MEASURED_AT, "waist": 80 }),
    )
    .await
}

pub async fn load(db: &LocalDatabase, entity: EntityKind, id: &str) -> LocalRecord {
    db.get_by_id(entity, id)
        .await
        .expect("Failed to load record")
        .expect("Record missing")
}

use super::{require_key, server_timestamps, EntitySyncHandler, LocalRecords, SyncOutcome};
use crate::api::{BodyMeasurementService, Measurements};
use crate::local_db::OfflineStore;
use crate::shared::{EntityKind, LocalRecord, StatusUpdate, SyncError, SyncResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Measurement fields the backend accepts
pub const MEASUREMENT_FIELDS: [&str; 13] = [
    "waist",
    "hip",
    "chest",
    "neck",
    "shoulder",
    "abdomen",
    "left_bicep",
    "right_bicep",
    "left_thigh",
    "right_thigh",
    "left_calf",
    "right_calf",
    "waist_hip_ratio",
];

/// Sparse map of the measurement fields holding finite numbers
pub fn extract_measurements(data: &Value) -> Measurements {
    MEASUREMENT_FIELDS
        .iter()
        .filter_map(|field| {
            data.get(*field)
                .and_then(Value::as_f64)
                .filter(|value| value.is_finite())
                .map(|value| (field.to_string(), value))
        })
        .collect()
}

/// Syncs body measurements, keyed by user and measurement timestamp
pub struct BodyMeasurementHandler {
    records: LocalRecords,
    service: Arc<dyn BodyMeasurementService>,
}

impl BodyMeasurementHandler {
    pub fn new(store: Arc<dyn OfflineStore>, service: Arc<dyn BodyMeasurementService>) -> Self {
        Self {
            records: LocalRecords::new(store, Self::ENTITY),
            service,
        }
    }

    fn timestamp(record: &LocalRecord) -> SyncResult<String> {
        record
            .data
            .get("MeasurementTimestamp")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                SyncError::invalid_record(Self::ENTITY, &record.id, "missing MeasurementTimestamp")
            })
    }
}

/// The server row is addressed by timestamp; fall back to it when the
/// response carries no explicit update time
fn measurement_status(payload: &Value, timestamp: &str) -> StatusUpdate {
    let mut update = server_timestamps(payload);
    if update.server_updated_at.is_none() {
        update.server_updated_at = payload
            .get("MeasurementTimestamp")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(timestamp.to_string()));
    }
    update
}

#[async_trait]
impl EntitySyncHandler for BodyMeasurementHandler {
    const ENTITY: EntityKind = EntityKind::BodyMeasurement;

    async fn create_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let timestamp = Self::timestamp(&record)?;
        let measurements = extract_measurements(&record.data);

        let payload = self
            .records
            .push(
                &record,
                self.service
                    .log_body_measurement(&record.user_id, &measurements, &timestamp),
                |payload| measurement_status(payload, &timestamp),
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn update_on_server(&self, record_id: &str) -> SyncResult<SyncOutcome> {
        let record = self.records.load(record_id).await?;
        let timestamp = Self::timestamp(&record)?;
        let measurements = extract_measurements(&record.data);

        let payload = self
            .records
            .push(
                &record,
                self.service
                    .update_body_measurement(&record.user_id, &timestamp, &measurements),
                |payload| measurement_status(payload, &timestamp),
            )
            .await?;
        Ok(SyncOutcome::Synced(payload))
    }

    async fn delete_from_server(&self, data: &Value) -> SyncResult<SyncOutcome> {
        let user_id = require_key(Self::ENTITY, data, "userId")?;
        let timestamp = require_key(Self::ENTITY, data, "measurementTimestamp")?;

        self.service.delete_body_measurement(&user_id, &timestamp).await?;
        tracing::info!(user_id = %user_id, timestamp = %timestamp, "Deleted body measurement on server");
        Ok(SyncOutcome::Deleted)
    }
}

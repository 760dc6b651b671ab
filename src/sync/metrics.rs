//! # Sync Metrics
//!
//! Running totals across sync cycles.

use crate::offline::ProcessReport;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncMetrics {
    /// Completed sync cycles
    pub total_syncs: u64,
    pub operations_attempted: u64,
    pub operations_synced: u64,
    /// Attempts that ended in a retry or a dead letter
    pub operations_failed: u64,
    pub conflicts: u64,
    pub dead_lettered: u64,
    /// Operations accepted locally with no server counterpart
    pub not_implemented: u64,
    pub average_sync_duration: Duration,
    pub last_sync_duration: Option<Duration>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self, report: &ProcessReport, duration: Duration) {
        self.total_syncs += 1;
        self.operations_attempted += report.attempted as u64;
        self.operations_synced += report.synced as u64;
        self.operations_failed += (report.retried + report.dead_lettered) as u64;
        self.conflicts += report.conflicts as u64;
        self.dead_lettered += report.dead_lettered as u64;
        self.not_implemented += report.not_implemented as u64;

        // Rolling average
        let previous = u32::try_from(self.total_syncs - 1).unwrap_or(u32::MAX);
        let cycles = previous.saturating_add(1);
        self.average_sync_duration = (self.average_sync_duration * previous + duration) / cycles;
        self.last_sync_duration = Some(duration);
    }

    /// Share of attempted operations the server accepted
    pub fn success_rate(&self) -> f64 {
        if self.operations_attempted == 0 {
            0.0
        } else {
            (self.operations_synced + self.not_implemented) as f64 / self.operations_attempted as f64
        }
    }
}

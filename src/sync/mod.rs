//! # Background Sync Service
//!
//! Periodically drains the sync queue while the device is online.
//!
//! ## Architecture
//!
//! - **Background Task**: a `tokio::time::interval` loop that runs a sync
//!   cycle on every tick unless auto sync is off or the network is offline
//! - **Sync State**: what a UI shows (in progress, last sync, backlog, errors)
//! - **Metrics**: running totals across cycles (`metrics.rs`)
//!
//! A cycle runs [`SyncQueueManager::process_due`] passes until nothing is
//! due, capped at [`MAX_PASSES_PER_CYCLE`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fitsync::offline::SyncQueueManager;
//! use fitsync::shared::SyncConfig;
//! use fitsync::sync::{NetworkStatus, SyncService};
//! use std::sync::Arc;
//!
//! # async fn example(manager: Arc<SyncQueueManager>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut service = SyncService::new(manager, SyncConfig::default());
//! service.set_network_status(NetworkStatus::Online).await;
//! service.start()?;
//!
//! let report = service.force_sync().await;
//! let status = service.get_status().await;
//! # Ok(())
//! # }
//! ```

pub mod metrics;

pub use metrics::SyncMetrics;

use crate::local_db::LocalDatabase;
use crate::offline::{ProcessReport, SyncQueueManager};
use crate::shared::SyncConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Upper bound on queue passes in one cycle
pub const MAX_PASSES_PER_CYCLE: usize = 32;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Sync service is already running")]
    AlreadyRunning,
}

/// Network connectivity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkStatus {
    /// Online with good connectivity
    #[default]
    Online,
    /// Online with limited connectivity
    Limited,
    Offline,
}

/// Current synchronization state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncState {
    /// Whether a cycle is currently running
    pub is_syncing: bool,
    /// End of the last completed cycle
    pub last_sync: Option<DateTime<Utc>>,
    /// Live operations left in the queue
    pub pending_operations: usize,
    pub dead_lettered: usize,
    pub network_status: NetworkStatus,
    /// Last error of every operation waiting on a retry or dead-lettered
    pub errors: Vec<String>,
}

#[derive(Clone)]
struct Shared {
    manager: Arc<SyncQueueManager>,
    state: Arc<RwLock<SyncState>>,
    metrics: Arc<RwLock<SyncMetrics>>,
    database: Option<Arc<LocalDatabase>>,
}

/// Main sync service coordinator
pub struct SyncService {
    config: SyncConfig,
    shared: Shared,
    background_task: Option<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(manager: Arc<SyncQueueManager>, config: SyncConfig) -> Self {
        Self {
            config,
            shared: Shared {
                manager,
                state: Arc::new(RwLock::new(SyncState::default())),
                metrics: Arc::new(RwLock::new(SyncMetrics::new())),
                database: None,
            },
            background_task: None,
        }
    }

    /// Persist the last sync time in the database's sync metadata
    pub fn with_database(mut self, database: Arc<LocalDatabase>) -> Self {
        self.shared.database = Some(database);
        self
    }

    /// Start the background sync loop
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.background_task.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }

        let shared = self.shared.clone();
        let config = self.config.clone();
        tracing::info!(interval_seconds = config.sync_interval_seconds, "Starting sync service");
        self.background_task = Some(tokio::spawn(async move {
            background_sync_loop(shared, config).await;
        }));
        Ok(())
    }

    /// Stop the background sync loop
    pub fn stop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
            tracing::info!("Stopped sync service");
        }
    }

    pub fn is_running(&self) -> bool {
        self.background_task.is_some()
    }

    /// Run a cycle now, whatever the network status says
    pub async fn force_sync(&self) -> ProcessReport {
        perform_sync_cycle(&self.shared).await
    }

    pub async fn get_status(&self) -> SyncState {
        self.shared.state.read().await.clone()
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.shared.metrics.read().await.clone()
    }

    pub async fn set_network_status(&self, status: NetworkStatus) {
        let mut state = self.shared.state.write().await;
        if state.network_status != status {
            tracing::info!(from = ?state.network_status, to = ?status, "Network status changed");
            state.network_status = status;
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if let Some(handle) = self.background_task.take() {
            handle.abort();
        }
    }
}

async fn background_sync_loop(shared: Shared, config: SyncConfig) {
    let mut interval = tokio::time::interval(Duration::from_secs(config.sync_interval_seconds.max(1)));

    loop {
        interval.tick().await;

        if should_perform_sync(&config, &shared).await {
            perform_sync_cycle(&shared).await;
        }
    }
}

async fn should_perform_sync(config: &SyncConfig, shared: &Shared) -> bool {
    let state = shared.state.read().await;

    if state.network_status == NetworkStatus::Offline {
        tracing::debug!("Offline; skipping sync cycle");
        return false;
    }

    config.auto_sync
}

async fn perform_sync_cycle(shared: &Shared) -> ProcessReport {
    shared.state.write().await.is_syncing = true;
    let started = Instant::now();

    let mut report = ProcessReport::default();
    for _ in 0..MAX_PASSES_PER_CYCLE {
        let pass = shared.manager.process_due().await;
        report.merge(pass);
        if pass.attempted == 0 {
            break;
        }
    }

    let finished_at = Utc::now();
    let pending = shared.manager.pending().await;
    let dead_letters = shared.manager.dead_letters().await;
    let errors = pending
        .iter()
        .filter_map(|op| op.last_error.clone())
        .chain(dead_letters.iter().filter_map(|record| record.last_error.clone()))
        .collect();

    shared.metrics.write().await.record_cycle(&report, started.elapsed());
    {
        let mut state = shared.state.write().await;
        state.is_syncing = false;
        state.last_sync = Some(finished_at);
        state.pending_operations = pending.len();
        state.dead_lettered = dead_letters.len();
        state.errors = errors;
    }

    if let Some(database) = &shared.database {
        if let Err(e) = database.set_last_sync_time(finished_at).await {
            tracing::warn!(error = %e, "Failed to record last sync time");
        }
    }

    if report.attempted > 0 {
        tracing::info!(
            attempted = report.attempted,
            synced = report.synced,
            pending = pending.len(),
            dead_lettered = dead_letters.len(),
            "Sync cycle finished"
        );
    }
    report
}

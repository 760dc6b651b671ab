/**
 * fitsync Worker Entry Point
 *
 * Runs the background sync service against the local store until Ctrl-C.
 */

use fitsync::api::ApiClient;
use fitsync::handlers::HandlerRegistry;
use fitsync::local_db::LocalDatabase;
use fitsync::offline::SyncQueueManager;
use fitsync::shared::AppConfig;
use fitsync::sync::SyncService;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config_path = std::env::var("FITSYNC_CONFIG").ok().map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let database_path = config.database_path();
    tracing::info!(server = %config.server_url, database = %database_path.display(), "Starting fitsync worker");

    let db = Arc::new(LocalDatabase::open(&database_path).await?);
    let api = Arc::new(ApiClient::new(&config)?);
    let registry = HandlerRegistry::with_defaults(db.clone(), api);

    let manager = SyncQueueManager::from_config(registry, &config.sync).with_journal(db.clone());
    let restored = manager.restore().await?;

    let stats = db.get_stats().await?;
    tracing::info!(
        restored,
        pending_records = stats.pending_records,
        conflicted_records = stats.conflicted_records,
        dead_letters = stats.dead_letters,
        "Local store ready"
    );
    if let Some(last_sync) = db.last_sync_time().await? {
        tracing::info!(%last_sync, "Last successful sync");
    }

    let mut service = SyncService::new(Arc::new(manager), config.sync.clone()).with_database(db);
    service.start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    service.stop();

    Ok(())
}

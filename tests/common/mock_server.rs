//! Mock API server helpers
//!
//! Wires a [`wiremock::MockServer`] to a real [`ApiClient`] and builds queue
//! managers on top of it.

use fitsync::api::ApiClient;
use fitsync::handlers::HandlerRegistry;
use fitsync::local_db::LocalDatabase;
use fitsync::offline::{BackoffStrategy, RetryPolicy, SyncQueueManager};
use fitsync::shared::AppConfig;
use std::sync::Arc;
use wiremock::MockServer;

/// Mock server plus a client pointed at it
pub struct MockApi {
    pub server: MockServer,
    pub client: Arc<ApiClient>,
}

impl MockApi {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let config = AppConfig::builder()
            .server_url(server.uri())
            .api_token("test-token")
            .build()
            .expect("Invalid test config");
        let client = Arc::new(ApiClient::new(&config).expect("Failed to build client"));
        Self { server, client }
    }

    /// Methods and paths of every request received so far
    pub async fn requests(&self) -> Vec<(String, String)> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|request| (request.method.to_string(), request.url.path().to_string()))
            .collect()
    }

    /// Queue manager over `db` with immediate retries and a journal
    pub fn manager(&self, db: &Arc<LocalDatabase>, max_attempts: u32) -> SyncQueueManager {
        let registry = HandlerRegistry::with_defaults(db.clone(), self.client.clone());
        SyncQueueManager::new(registry)
            .with_journal(db.clone())
            .with_policy(RetryPolicy::new(
                BackoffStrategy::Fixed { interval_seconds: 0 },
                max_attempts,
            ))
    }
}

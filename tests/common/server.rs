//! Test server lifecycle management
//!
//! Spawns the real router on a random port with an isolated database, wired to
//! the fixture collaborators.

use super::constants::*;
use super::fixtures::{FixtureIngestor, TopicGrouper};
use lucid_server::background_jobs::PipelineScheduler;
use lucid_server::config::{ListingSettings, PipelineSettings, SchedulerSettings};
use lucid_server::news_store::NewsStore;
use lucid_server::pipeline::{Collaborators, ExtractiveEnricher, PipelineCoordinator};
use lucid_server::ranking::RelevanceRanker;
use lucid_server::server::{make_app, ServerConfig, ServerState};
use lucid_server::SqliteNewsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<dyn NewsStore>,
    pub coordinator: Arc<PipelineCoordinator>,
    scheduler: Option<PipelineScheduler>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Spawns a server with the scheduler disabled.
    pub async fn spawn() -> Self {
        Self::spawn_inner(None).await
    }

    /// Spawns a server with a running scheduler. The jobs are scheduled far in
    /// the future so only manual triggers run them.
    pub async fn spawn_with_scheduler() -> Self {
        let settings = SchedulerSettings {
            enabled: true,
            initial_delay: Duration::from_secs(3600),
            full_refresh_interval: Duration::from_secs(6 * 3600),
            quick_interval: Duration::from_secs(3600),
        };
        Self::spawn_inner(Some(settings)).await
    }

    async fn spawn_inner(scheduler_settings: Option<SchedulerSettings>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store: Arc<dyn NewsStore> = Arc::new(
            SqliteNewsStore::new(temp_dir.path().join("news.db"))
                .expect("Failed to create news store"),
        );

        let collaborators = Collaborators {
            ingestor: Arc::new(FixtureIngestor {
                store: store.clone(),
            }),
            grouper: Arc::new(TopicGrouper {
                store: store.clone(),
            }),
            enricher: Arc::new(ExtractiveEnricher),
        };
        let settings = PipelineSettings {
            ingest_skip_threshold: TEST_INGEST_SKIP_THRESHOLD,
            ..Default::default()
        };
        let coordinator = Arc::new(PipelineCoordinator::new(
            store.clone(),
            collaborators,
            settings,
        ));

        let (scheduler, scheduler_handle) = match scheduler_settings {
            Some(settings) => {
                let scheduler = PipelineScheduler::new(coordinator.clone());
                let handle = scheduler.start(&settings).await;
                (Some(scheduler), handle)
            }
            None => (None, None),
        };

        let state = ServerState::new(
            ServerConfig::default(),
            coordinator.clone(),
            RelevanceRanker::default(),
            ListingSettings::default(),
            scheduler_handle,
        );
        let app = make_app(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr: SocketAddr = listener.local_addr().expect("Failed to get local addr");
        let base_url = format!("http://{}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Test server failed");
        });

        let server = Self {
            base_url,
            store,
            coordinator,
            scheduler,
            shutdown_tx: Some(shutdown_tx),
            _temp_dir: temp_dir,
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::new();
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        while tokio::time::Instant::now() < deadline {
            if client
                .get(format!("{}/", self.base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
        panic!("Test server did not become ready in time");
    }

    /// Stops the scheduler if one is running.
    pub async fn stop_scheduler(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop().await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

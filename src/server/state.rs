use axum::extract::FromRef;

use crate::background_jobs::SchedulerHandle;
use crate::config::ListingSettings;
use crate::news_store::NewsStore;
use crate::pipeline::PipelineCoordinator;
use crate::ranking::RelevanceRanker;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedNewsStore = Arc<dyn NewsStore>;
pub type GuardedCoordinator = Arc<PipelineCoordinator>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub news_store: GuardedNewsStore,
    pub coordinator: GuardedCoordinator,
    pub ranker: RelevanceRanker,
    pub listing: ListingSettings,
    /// `None` when the scheduler is disabled.
    pub scheduler_handle: OptionalSchedulerHandle,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        coordinator: GuardedCoordinator,
        ranker: RelevanceRanker,
        listing: ListingSettings,
        scheduler_handle: OptionalSchedulerHandle,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_string(),
            news_store: Arc::clone(coordinator.store()),
            coordinator,
            ranker,
            listing,
            scheduler_handle,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedNewsStore {
    fn from_ref(input: &ServerState) -> Self {
        input.news_store.clone()
    }
}

impl FromRef<ServerState> for GuardedCoordinator {
    fn from_ref(input: &ServerState) -> Self {
        input.coordinator.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}

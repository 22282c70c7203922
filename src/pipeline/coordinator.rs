use super::collaborators::Collaborators;
use super::run_result::{RunMode, RunResult, RunStatus};
use crate::config::PipelineSettings;
use crate::news_store::NewsStore;
use crate::server::metrics;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Decides whether a run should fetch new items.
///
/// A forced run always ingests; otherwise ingestion is skipped once the
/// recent window already holds `threshold` items or more.
pub fn should_ingest(force: bool, recent_count: usize, threshold: usize) -> bool {
    force || recent_count < threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    CountRecent,
    CheckUngrouped,
    Group,
    LoadItems,
    Persist,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::CountRecent => "count_recent",
            PipelineStage::CheckUngrouped => "check_ungrouped",
            PipelineStage::Group => "group",
            PipelineStage::LoadItems => "load_items",
            PipelineStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("pipeline failed at {stage}: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: anyhow::Error,
}

fn at(stage: PipelineStage) -> impl FnOnce(anyhow::Error) -> PipelineError {
    move |source| PipelineError { stage, source }
}

#[derive(Debug, Default)]
struct ScrapeState {
    last_ingest_at: Option<DateTime<Utc>>,
}

/// Runs the refresh pipeline against one store.
///
/// Runs are synchronous and serialized: a manual run and a scheduled run never
/// interleave. Failures never escape; they end up in the returned
/// [`RunResult`].
pub struct PipelineCoordinator {
    store: Arc<dyn NewsStore>,
    collaborators: Collaborators,
    settings: PipelineSettings,
    scrape_state: Mutex<ScrapeState>,
    run_lock: Mutex<()>,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn NewsStore>,
        collaborators: Collaborators,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            collaborators,
            settings,
            scrape_state: Mutex::new(ScrapeState::default()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn NewsStore> {
        &self.store
    }

    /// Time of the last successful ingestion by this process. Advisory only.
    pub fn last_ingest_at(&self) -> Option<DateTime<Utc>> {
        self.scrape_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_ingest_at
    }

    pub fn run_pipeline(&self, force: bool) -> RunResult {
        self.run(if force { RunMode::Forced } else { RunMode::Smart })
    }

    /// Processes ungrouped items only, never ingests.
    pub fn run_quick(&self) -> RunResult {
        self.run(RunMode::Quick)
    }

    fn run(&self, mode: RunMode) -> RunResult {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        info!(mode = %mode, "Pipeline run started");

        let mut result = RunResult::new(mode);
        let outcome = self.execute(mode, &mut result);
        result.duration = start.elapsed();

        match outcome {
            Ok(()) => {
                result.status = RunStatus::Completed;
                info!(
                    mode = %mode,
                    ingested = result.ingested,
                    groups = result.groups_found,
                    records_created = result.records_created,
                    enrich_failures = result.enrich_failures,
                    "Pipeline run completed in {:.1}s",
                    result.duration.as_secs_f64()
                );
            }
            Err(err) => {
                error!(mode = %mode, stage = %err.stage, "Pipeline run failed: {:#}", err.source);
                result.status = RunStatus::Failed;
                result.error = Some(err.to_string());
            }
        }

        metrics::record_pipeline_run(
            mode.as_str(),
            result.status.as_str(),
            result.duration,
            result.records_created,
        );
        if let Ok(stats) = self.store.get_stats() {
            metrics::set_store_counts(stats.total_items, stats.total_records);
        }
        result
    }

    fn execute(&self, mode: RunMode, result: &mut RunResult) -> Result<(), PipelineError> {
        if mode != RunMode::Quick {
            let recent = self
                .store
                .count_items_since(self.settings.recent_window_hours)
                .map_err(at(PipelineStage::CountRecent))?;
            result.recent_count = Some(recent);

            if should_ingest(
                mode == RunMode::Forced,
                recent,
                self.settings.ingest_skip_threshold,
            ) {
                self.ingest(result);
            } else {
                info!(
                    recent,
                    window_hours = self.settings.recent_window_hours,
                    "Skipping ingestion, enough recent items"
                );
                metrics::record_ingest_skip();
            }
        }

        self.process_ungrouped(result)
    }

    fn ingest(&self, result: &mut RunResult) {
        result.ingest_attempted = true;
        match self.collaborators.ingestor.ingest_all() {
            Ok(count) => {
                result.ingested = count;
                self.scrape_state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .last_ingest_at = Some(Utc::now());
                info!(count, "Ingestion finished");
            }
            Err(err) => {
                warn!("Ingestion failed, continuing with stored items: {:#}", err);
                result.ingest_error = Some(format!("{:#}", err));
            }
        }
    }

    fn process_ungrouped(&self, result: &mut RunResult) -> Result<(), PipelineError> {
        let pending = self
            .store
            .has_ungrouped_items()
            .map_err(at(PipelineStage::CheckUngrouped))?;
        if !pending {
            debug!("No ungrouped items");
            return Ok(());
        }

        let groups = self
            .collaborators
            .grouper
            .group_pending()
            .map_err(at(PipelineStage::Group))?;
        result.groups_found = groups.len();

        for group in groups.iter().filter(|g| !g.is_empty()) {
            let items = self
                .store
                .get_items(&group.item_ids)
                .map_err(at(PipelineStage::LoadItems))?;
            if items.is_empty() {
                warn!(item_ids = ?group.item_ids, "Group refers to unknown items, skipping");
                continue;
            }

            let draft = match self.collaborators.enricher.enrich(group, &items) {
                Ok(draft) => draft,
                Err(err) => {
                    warn!(item_ids = ?group.item_ids, "Enrichment failed: {:#}", err);
                    result.enrich_failures += 1;
                    continue;
                }
            };

            match self
                .store
                .save_record(&draft, &group.item_ids)
                .map_err(at(PipelineStage::Persist))?
            {
                Some(record) => {
                    debug!(record_id = record.id, title = %record.title, "Record created");
                    result.records_created += 1;
                }
                None => debug!(item_ids = ?group.item_ids, "Group already processed"),
            }
        }
        Ok(())
    }
}

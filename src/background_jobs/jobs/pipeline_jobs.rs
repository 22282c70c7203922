//! The three scheduled entry points into the pipeline coordinator.

use crate::background_jobs::context::JobContext;
use crate::background_jobs::job::{BackgroundJob, JobError, JobSchedule};
use crate::config::SchedulerSettings;
use crate::pipeline::RunMode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct PipelineJob {
    mode: RunMode,
    schedule: JobSchedule,
}

impl PipelineJob {
    /// Smart run, once, shortly after startup.
    pub fn initial(delay: Duration) -> Self {
        Self {
            mode: RunMode::Smart,
            schedule: JobSchedule::Once(delay),
        }
    }

    /// Forced run on a fixed interval.
    pub fn full_refresh(interval: Duration) -> Self {
        Self {
            mode: RunMode::Forced,
            schedule: JobSchedule::Interval(interval),
        }
    }

    /// Processes pending items on a fixed interval without ingesting.
    pub fn quick(interval: Duration) -> Self {
        Self {
            mode: RunMode::Quick,
            schedule: JobSchedule::Interval(interval),
        }
    }
}

impl BackgroundJob for PipelineJob {
    fn id(&self) -> &'static str {
        match self.mode {
            RunMode::Smart => "initial",
            RunMode::Forced => "full-refresh",
            RunMode::Quick => "quick",
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            RunMode::Smart => "Initial Refresh",
            RunMode::Forced => "Full Refresh",
            RunMode::Quick => "Quick Processing",
        }
    }

    fn description(&self) -> &'static str {
        match self.mode {
            RunMode::Smart => "Runs the pipeline once after startup, ingesting only if few items are recent",
            RunMode::Forced => "Ingests all sources and processes pending items",
            RunMode::Quick => "Groups and enriches pending items without ingesting",
        }
    }

    fn schedule(&self) -> JobSchedule {
        self.schedule
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let result = match self.mode {
            RunMode::Smart => ctx.coordinator.run_pipeline(false),
            RunMode::Forced => ctx.coordinator.run_pipeline(true),
            RunMode::Quick => ctx.coordinator.run_quick(),
        };

        if result.is_success() {
            info!(
                job = self.id(),
                ingested = result.ingested,
                records_created = result.records_created,
                "Scheduled pipeline run finished"
            );
            Ok(())
        } else {
            Err(JobError::ExecutionFailed(
                result
                    .error
                    .unwrap_or_else(|| "pipeline run failed".to_string()),
            ))
        }
    }
}

/// The jobs registered when the scheduler is enabled.
pub fn pipeline_jobs(settings: &SchedulerSettings) -> Vec<Arc<dyn BackgroundJob>> {
    vec![
        Arc::new(PipelineJob::initial(settings.initial_delay)),
        Arc::new(PipelineJob::full_refresh(settings.full_refresh_interval)),
        Arc::new(PipelineJob::quick(settings.quick_interval)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::scheduler::tests::test_context;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_jobs_ids_and_schedules() {
        let settings = SchedulerSettings {
            enabled: true,
            initial_delay: Duration::from_secs(60),
            full_refresh_interval: Duration::from_secs(6 * 3600),
            quick_interval: Duration::from_secs(3600),
        };
        let jobs = pipeline_jobs(&settings);
        let summary: Vec<_> = jobs.iter().map(|j| (j.id(), j.schedule())).collect();
        assert_eq!(
            summary,
            vec![
                ("initial", JobSchedule::Once(Duration::from_secs(60))),
                ("full-refresh", JobSchedule::Interval(Duration::from_secs(21600))),
                ("quick", JobSchedule::Interval(Duration::from_secs(3600))),
            ]
        );
    }

    #[test]
    fn test_execute_runs_coordinator() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(&temp_dir);

        PipelineJob::quick(Duration::from_secs(1)).execute(&ctx).unwrap();
        PipelineJob::full_refresh(Duration::from_secs(1))
            .execute(&ctx)
            .unwrap();
        // The null ingestor succeeds, so the forced run counts as an ingest.
        assert!(ctx.coordinator.last_ingest_at().is_some());
    }

    #[test]
    fn test_execute_respects_cancellation() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_context(&temp_dir);
        ctx.cancellation_token.cancel();

        let result = PipelineJob::initial(Duration::ZERO).execute(&ctx);
        assert_eq!(result, Err(JobError::Cancelled));
    }
}

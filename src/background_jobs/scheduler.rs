use super::context::JobContext;
use super::handle::{delay_from, JobRunInfo, SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, JobError};
use crate::server::metrics;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the loop sleeps when no job is due.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Runs registered jobs on their timers, strictly one at a time.
pub struct JobScheduler {
    /// Shared state accessible by SchedulerHandle
    shared_state: Arc<RwLock<SharedJobState>>,

    /// Jobs whose next run was requested through the handle.
    manual_triggers: HashSet<String>,

    /// Receiver for commands from SchedulerHandle
    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    /// Shared context provided to jobs during execution.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            shared_state,
            manual_triggers: HashSet::new(),
            command_receiver,
            shutdown_token,
            job_context,
        }
    }

    /// Register a job with the scheduler, replacing any job with the same id.
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id();
        let mut state = self.shared_state.write().await;
        if state.register(Arc::clone(&job), Utc::now()) {
            info!("Replacing job: {} - {}", job_id, job.description());
        } else {
            info!("Registering job: {} - {}", job_id, job.description());
        }
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        loop {
            let sleep_duration = self.time_until_next_due_job().await;
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
            }
        }

        info!("Scheduler shutdown complete");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::RegisterJob { job } => self.register_job(job).await,
            SchedulerCommand::TriggerJob { job_id } => {
                let mut state = self.shared_state.write().await;
                match state.jobs.get_mut(&job_id) {
                    Some(scheduled) => {
                        info!("Manually triggering job: {}", job_id);
                        scheduled.next_run_at = Some(Utc::now());
                        self.manual_triggers.insert(job_id);
                    }
                    None => warn!("Trigger for unknown job {} ignored", job_id),
                }
            }
        }
    }

    async fn time_until_next_due_job(&self) -> Duration {
        let state = self.shared_state.read().await;
        match state.next_due() {
            Some((_, at)) => (at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
            None => IDLE_CHECK_INTERVAL,
        }
    }

    async fn run_due_jobs(&mut self) {
        while !self.shutdown_token.is_cancelled() {
            let due = {
                let state = self.shared_state.read().await;
                let now = Utc::now();
                state
                    .next_due()
                    .filter(|(_, at)| *at <= now)
                    .map(|(id, _)| id.to_string())
            };
            match due {
                Some(job_id) => self.run_job(&job_id).await,
                None => break,
            }
        }
    }

    /// Runs one job to completion on the blocking pool and records the
    /// outcome. The loop does not pick another job until this returns.
    async fn run_job(&mut self, job_id: &str) {
        let (job, generation) = {
            let mut state = self.shared_state.write().await;
            let Some(scheduled) = state.jobs.get_mut(job_id) else {
                return;
            };
            let job = Arc::clone(&scheduled.job);
            let generation = scheduled.generation;
            scheduled.next_run_at = job
                .schedule()
                .interval()
                .map(|interval| delay_from(Utc::now(), interval));
            state.running_job = Some(job_id.to_string());
            (job, generation)
        };

        let triggered_by = if self.manual_triggers.remove(job_id) {
            "manual"
        } else {
            "schedule"
        };
        info!("Running job {} (triggered by {})", job_id, triggered_by);
        metrics::set_background_job_running(job_id, true);

        let job_token = self.shutdown_token.child_token();
        let ctx = JobContext {
            cancellation_token: job_token.clone(),
            ..self.job_context.clone()
        };
        let started_at = Utc::now();
        let start = Instant::now();
        let schedule = job.schedule();

        // On shutdown the scheduler stops waiting; the blocking run sees a
        // cancelled token and finishes on its own thread.
        let mut task = tokio::task::spawn_blocking(move || job.execute(&ctx));
        let joined = tokio::select! {
            joined = &mut task => Some(joined),
            _ = self.shutdown_token.cancelled() => {
                job_token.cancel();
                None
            }
        };

        let elapsed = start.elapsed();
        let (status, error_message) = match joined {
            Some(Ok(Ok(()))) => {
                info!("Job {} completed in {:?}", job_id, elapsed);
                ("success", None)
            }
            Some(Ok(Err(JobError::Cancelled))) => {
                info!("Job {} was cancelled", job_id);
                ("cancelled", Some(JobError::Cancelled.to_string()))
            }
            Some(Ok(Err(e))) => {
                error!("Job {} failed: {}", job_id, e);
                ("failed", Some(e.to_string()))
            }
            Some(Err(join_error)) => {
                let e = JobError::Panicked(join_error.to_string());
                error!("Job {} panicked: {}", job_id, e);
                ("panic", Some(e.to_string()))
            }
            None => {
                warn!("Abandoning job {} on shutdown", job_id);
                ("abandoned", Some("Scheduler stopped before the job finished".to_string()))
            }
        };
        metrics::record_background_job_execution(job_id, status, elapsed);
        metrics::set_background_job_running(job_id, false);

        let finished_at = Utc::now();
        let mut state = self.shared_state.write().await;
        state.running_job = None;
        if let Some(scheduled) = state.jobs.get_mut(job_id) {
            scheduled.last_run = Some(JobRunInfo {
                started_at: started_at.to_rfc3339(),
                finished_at: finished_at.to_rfc3339(),
                status: status.to_string(),
                error_message,
                triggered_by: triggered_by.to_string(),
            });
            // A replaced job already carries a fresh timer.
            if scheduled.generation == generation {
                if let Some(interval) = schedule.interval() {
                    scheduled.next_run_at = Some(delay_from(finished_at, interval));
                }
            }
        }
    }
}

/// Create a scheduler and its handle.
pub fn create_scheduler(
    job_context: JobContext,
    shutdown_token: CancellationToken,
) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedJobState::default()));

    let scheduler = JobScheduler::new(
        command_rx,
        shutdown_token,
        job_context,
        Arc::clone(&shared_state),
    );
    let handle = SchedulerHandle::new(command_tx, shared_state);

    (scheduler, handle)
}

use super::job::{BackgroundJob, JobError, JobSchedule};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Information about a registered job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub schedule: JobScheduleInfo,
    pub is_running: bool,
    pub last_run: Option<JobRunInfo>,
    pub next_run_at: Option<String>,
}

/// Serializable schedule information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobScheduleInfo {
    #[serde(rename = "type")]
    pub schedule_type: String,
    pub value_secs: u64,
}

impl From<JobSchedule> for JobScheduleInfo {
    fn from(schedule: JobSchedule) -> Self {
        match schedule {
            JobSchedule::Once(delay) => JobScheduleInfo {
                schedule_type: "once".to_string(),
                value_secs: delay.as_secs(),
            },
            JobSchedule::Interval(interval) => JobScheduleInfo {
                schedule_type: "interval".to_string(),
                value_secs: interval.as_secs(),
            },
        }
    }
}

/// Serializable job run information.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: String,
    pub finished_at: String,
    pub status: String,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    RegisterJob { job: Arc<dyn BackgroundJob> },
    TriggerJob { job_id: String },
}

/// A registered job together with its timer.
pub struct ScheduledJob {
    pub job: Arc<dyn BackgroundJob>,
    /// None once a one-shot job has fired.
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run: Option<JobRunInfo>,
    /// Bumped on every re-registration, so a run of a replaced job does not
    /// touch the new timer.
    pub generation: u64,
}

/// `now + delay`, saturating at the latest representable time.
pub(crate) fn delay_from(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Shared state between scheduler and handle.
#[derive(Default)]
pub struct SharedJobState {
    pub jobs: HashMap<String, ScheduledJob>,
    /// At most one job runs at a time.
    pub running_job: Option<String>,
}

impl SharedJobState {
    /// Inserts the job, replacing any job with the same id and its timer.
    pub fn register(&mut self, job: Arc<dyn BackgroundJob>, now: DateTime<Utc>) -> bool {
        let id = job.id().to_string();
        let next_run_at = delay_from(now, job.schedule().first_run_delay());
        let (generation, last_run, replaced) = match self.jobs.remove(&id) {
            Some(previous) => (previous.generation + 1, previous.last_run, true),
            None => (0, None, false),
        };
        self.jobs.insert(
            id,
            ScheduledJob {
                job,
                next_run_at: Some(next_run_at),
                last_run,
                generation,
            },
        );
        replaced
    }

    /// Id of the job due earliest, ties broken by id.
    pub fn next_due(&self) -> Option<(&str, DateTime<Utc>)> {
        self.jobs
            .iter()
            .filter_map(|(id, job)| job.next_run_at.map(|at| (id.as_str(), at)))
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
    }
}

/// Handle to interact with the job scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
        }
    }

    /// Get information about all registered jobs, sorted by id.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let state = self.shared_state.read().await;
        let mut jobs: Vec<JobInfo> = state
            .jobs
            .iter()
            .map(|(job_id, scheduled)| JobInfo {
                id: job_id.clone(),
                name: scheduled.job.name().to_string(),
                description: scheduled.job.description().to_string(),
                schedule: scheduled.job.schedule().into(),
                is_running: state.running_job.as_deref() == Some(job_id.as_str()),
                last_run: scheduled.last_run.clone(),
                next_run_at: scheduled.next_run_at.map(|at| at.to_rfc3339()),
            })
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub async fn job_exists(&self, job_id: &str) -> bool {
        let state = self.shared_state.read().await;
        state.jobs.contains_key(job_id)
    }

    /// Registers a job on the running scheduler, replacing any job with the
    /// same id.
    pub async fn register_job(&self, job: Arc<dyn BackgroundJob>) -> Result<(), JobError> {
        self.command_tx
            .send(SchedulerCommand::RegisterJob { job })
            .await
            .map_err(|_| JobError::SchedulerStopped)
    }

    /// Queues a job to run as soon as the scheduler is idle. Does not wait for
    /// the run.
    pub async fn trigger_job(&self, job_id: &str) -> Result<(), JobError> {
        if !self.job_exists(job_id).await {
            return Err(JobError::NotFound);
        }
        self.command_tx
            .send(SchedulerCommand::TriggerJob {
                job_id: job_id.to_string(),
            })
            .await
            .map_err(|_| JobError::SchedulerStopped)
    }
}

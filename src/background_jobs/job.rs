use super::context::JobContext;
use std::time::Duration;

/// Schedule for when a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run once, this long after registration
    Once(Duration),
    /// Run repeatedly, the first time one interval after registration
    Interval(Duration),
}

impl JobSchedule {
    /// Delay between registration and the first run.
    pub fn first_run_delay(&self) -> Duration {
        match self {
            JobSchedule::Once(delay) | JobSchedule::Interval(delay) => *delay,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            JobSchedule::Once(_) => None,
            JobSchedule::Interval(interval) => Some(*interval),
        }
    }
}

/// Errors that can occur during job execution.
#[derive(Debug, Clone, PartialEq)]
pub enum JobError {
    NotFound,
    ExecutionFailed(String),
    Cancelled,
    Panicked(String),
    SchedulerStopped,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::NotFound => write!(f, "Job not found"),
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
            JobError::Panicked(msg) => write!(f, "Job panicked: {}", msg),
            JobError::SchedulerStopped => write!(f, "Scheduler is not running"),
        }
    }
}

impl std::error::Error for JobError {}

/// Trait for background jobs.
///
/// Jobs are executed synchronously in a blocking context, one at a time.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier. Registering a job with an existing id replaces it.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}

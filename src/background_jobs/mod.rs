//! Background job scheduling for the refresh pipeline.
//!
//! Jobs run on timers inside a single scheduler task and never overlap.

mod context;
mod handle;
mod job;
pub mod jobs;
mod lifecycle;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobInfo, JobRunInfo, JobScheduleInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, JobSchedule};
pub use lifecycle::PipelineScheduler;
pub use scheduler::{create_scheduler, JobScheduler};

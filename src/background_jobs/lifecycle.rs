use super::context::JobContext;
use super::handle::SchedulerHandle;
use super::jobs::pipeline_jobs;
use super::scheduler::create_scheduler;
use crate::config::SchedulerSettings;
use crate::pipeline::PipelineCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

struct RunningScheduler {
    handle: SchedulerHandle,
    shutdown_token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the scheduler task driving the pipeline jobs.
///
/// `start` is idempotent: calling it on a running scheduler re-registers the
/// jobs, which replaces their timers instead of adding new ones.
pub struct PipelineScheduler {
    coordinator: Arc<PipelineCoordinator>,
    running: Mutex<Option<RunningScheduler>>,
}

impl PipelineScheduler {
    pub fn new(coordinator: Arc<PipelineCoordinator>) -> Self {
        Self {
            coordinator,
            running: Mutex::new(None),
        }
    }

    /// Starts the scheduler, or refreshes the jobs of a running one. Returns
    /// `None` and schedules nothing when disabled or misconfigured.
    pub async fn start(&self, settings: &SchedulerSettings) -> Option<SchedulerHandle> {
        if !settings.enabled {
            info!("Scheduler disabled, no background pipeline runs");
            return None;
        }
        if let Err(e) = settings.validate() {
            error!("Invalid scheduler settings, scheduler not started: {:#}", e);
            return None;
        }

        let jobs = pipeline_jobs(settings);
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref().filter(|r| !r.task.is_finished()) {
            info!("Scheduler already running, re-registering jobs");
            for job in jobs {
                if let Err(e) = current.handle.register_job(job).await {
                    warn!("Failed to re-register job: {}", e);
                }
            }
            return Some(current.handle.clone());
        }

        let shutdown_token = CancellationToken::new();
        let job_context = JobContext::new(shutdown_token.clone(), Arc::clone(&self.coordinator));
        let (mut scheduler, handle) = create_scheduler(job_context, shutdown_token.clone());
        for job in jobs {
            scheduler.register_job(job).await;
        }
        let task = tokio::spawn(async move {
            scheduler.run().await;
        });

        info!(
            initial_delay = ?settings.initial_delay,
            full_refresh_interval = ?settings.full_refresh_interval,
            quick_interval = ?settings.quick_interval,
            "Scheduler started"
        );
        *running = Some(RunningScheduler {
            handle: handle.clone(),
            shutdown_token,
            task,
        });
        Some(handle)
    }

    /// Stops the scheduler and releases every timer. Safe to call when not
    /// running.
    pub async fn stop(&self) {
        let Some(current) = self.running.lock().await.take() else {
            return;
        };
        info!("Stopping scheduler");
        current.shutdown_token.cancel();
        match tokio::time::timeout(STOP_TIMEOUT, current.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Scheduler task ended abnormally: {}", e),
            Err(_) => warn!("Scheduler did not stop within {:?}", STOP_TIMEOUT),
        }
    }

    pub async fn handle(&self) -> Option<SchedulerHandle> {
        self.running.lock().await.as_ref().map(|r| r.handle.clone())
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

use crate::pipeline::PipelineCoordinator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// The pipeline the scheduled jobs drive.
    pub coordinator: Arc<PipelineCoordinator>,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken, coordinator: Arc<PipelineCoordinator>) -> Self {
        Self {
            cancellation_token,
            coordinator,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

//! Scheduler inspection and manual triggering.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::info;

use crate::background_jobs::{JobError, JobInfo};
use crate::server::state::{OptionalSchedulerHandle, ServerState};

async fn list_jobs(State(scheduler): State<OptionalSchedulerHandle>) -> Response {
    let jobs: Vec<JobInfo> = match scheduler {
        Some(handle) => handle.list_jobs().await,
        None => Vec::new(),
    };
    Json(jobs).into_response()
}

async fn trigger_job(
    State(scheduler): State<OptionalSchedulerHandle>,
    Path(job_id): Path<String>,
) -> Response {
    let Some(handle) = scheduler else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Scheduler is disabled" })),
        )
            .into_response();
    };

    match handle.trigger_job(&job_id).await {
        Ok(()) => {
            info!("Job {} queued by API request", job_id);
            (
                StatusCode::ACCEPTED,
                Json(json!({ "status": "queued", "job_id": job_id })),
            )
                .into_response()
        }
        Err(JobError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown job: {}", job_id) })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub fn job_routes() -> Router<ServerState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}/trigger", post(trigger_job))
}

//! Job producer and scheduler endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use nosh_core::JobPayload;
use nosh_db::Job;
use nosh_worker::TickOutcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(enqueue_job))
        .route("/tick", post(run_tick))
        .route("/{id}", get(get_job))
}

#[derive(Serialize)]
struct JobResponse {
    id: Uuid,
    job_type: String,
    status: String,
    processor_id: Option<String>,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            processor_id: job.processor_id,
            attempts: job.attempts,
            last_error: job.last_error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Enqueue a job. The payload body is the tagged union, so an unknown
/// `job_type` is rejected at the door rather than failing at dispatch.
async fn enqueue_job(
    State(state): State<AppState>,
    Json(payload): Json<JobPayload>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let job = state.jobs.enqueue(&payload).await?;
    Ok((StatusCode::CREATED, Json(job.into())))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;
    Ok(Json(job.into()))
}

/// Run one dispatcher tick. Called by the external scheduler; each call
/// processes at most one job.
async fn run_tick(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let outcome = state.dispatcher.run_tick().await?;
    let body = match outcome {
        TickOutcome::Idle => json!({ "outcome": "idle" }),
        TickOutcome::Completed { job_id } => {
            json!({ "outcome": "completed", "job_id": job_id })
        }
        TickOutcome::Failed { job_id, error } => {
            json!({ "outcome": "failed", "job_id": job_id, "error": error })
        }
        TickOutcome::LeaseLost { job_id } => {
            json!({ "outcome": "lease_lost", "job_id": job_id })
        }
    };
    Ok(Json(body))
}

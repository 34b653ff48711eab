//! Handlers for the `/jobs` resource.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prism_core::error::CoreError;
use prism_core::types::JobId;

use super::image_response;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

fn job_not_found(id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Every retained job, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.registry.list().await;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(job_id) = path?;
    let job = state
        .registry
        .snapshot(job_id)
        .await
        .ok_or_else(|| job_not_found(job_id))?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs/{id}/image
///
/// The job's own image; 404 until the job has completed.
pub async fn get_job_image(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
) -> AppResult<Response> {
    let Path(job_id) = path?;
    let image = state
        .registry
        .result(job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Image",
            id: job_id.to_string(),
        })?;
    Ok(image_response(&image))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancel a pending or running job. Returns 204 on success, 409 if the job
/// has already finished.
pub async fn cancel_job(
    State(state): State<AppState>,
    path: Result<Path<JobId>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(job_id) = path?;
    state.dispatcher.cancel(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

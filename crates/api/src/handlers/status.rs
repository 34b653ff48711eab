//! Legacy progress and image endpoints.
//!
//! Without a `job_id` query parameter they answer for the most recently
//! submitted job (progress) or the latest completed image.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use prism_core::error::CoreError;
use prism_core::job::JobStatus;
use prism_core::types::JobId;
use serde::{Deserialize, Serialize};

use super::image_response;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub job_id: Option<JobId>,
}

/// Body of `GET /progress`. All fields are null/zero before the first job.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: u8,
    pub status: Option<JobStatus>,
    pub job_id: Option<JobId>,
}

/// GET /progress[?job_id=]
pub async fn progress(
    State(state): State<AppState>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> AppResult<Json<ProgressResponse>> {
    let Query(query) = query?;
    let snapshot = match query.job_id {
        Some(id) => Some(state.registry.snapshot(id).await.ok_or(CoreError::NotFound {
            entity: "Job",
            id: id.to_string(),
        })?),
        None => state.registry.latest().await,
    };

    Ok(Json(match snapshot {
        Some(job) => ProgressResponse {
            progress: job.progress,
            status: Some(job.status),
            job_id: Some(job.id),
        },
        None => ProgressResponse {
            progress: 0,
            status: None,
            job_id: None,
        },
    }))
}

/// GET /image[?job_id=]
///
/// 404 while no matching image exists.
pub async fn image(
    State(state): State<AppState>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let image = match query.job_id {
        Some(id) => state.registry.result(id).await?,
        None => state.results.latest().await,
    };

    let image = image.ok_or(CoreError::NotFound {
        entity: "Image",
        id: query
            .job_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "latest".to_string()),
    })?;
    Ok(image_response(&image))
}

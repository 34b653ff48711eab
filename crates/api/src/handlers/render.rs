//! Job submission endpoints of the legacy surface.
//!
//! Both answer `202 Accepted` as soon as the job is admitted; clients follow
//! it through `/progress` or `/api/v1/jobs/{id}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use prism_core::job::JobStatus;
use prism_core::request::{validate_prompt, GenerateBody, RenderBody, RenderRequest};

use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, SubmittedJob};
use crate::state::AppState;

fn accepted(job_id: prism_core::types::JobId) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedJob {
                job_id,
                status: JobStatus::Pending,
            },
        }),
    )
}

// ---------------------------------------------------------------------------
// Preset / custom
// ---------------------------------------------------------------------------

/// POST /render
///
/// `prompt == "custom"` renders the procedural scene described by
/// `customSettings`; any other prompt must name a preset scene. Unknown
/// presets and out-of-range settings are rejected with 400 before a job
/// exists.
pub async fn render(
    State(state): State<AppState>,
    payload: Result<Json<RenderBody>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = payload?;
    let request = RenderRequest::from_body(body)?;
    let job_id = state.dispatcher.submit(request).await?;
    Ok(accepted(job_id))
}

// ---------------------------------------------------------------------------
// Generated
// ---------------------------------------------------------------------------

/// POST /renderAI
///
/// Ask the source generator for a program that renders `prompt`, then run
/// it through the dynamic code pipeline as a background job. Generator
/// failures answer 500 `UPSTREAM_ERROR` and create no job.
pub async fn render_ai(
    State(state): State<AppState>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = payload?;
    validate_prompt(&body.prompt)?;

    let source = state
        .generator
        .generate(&body.prompt)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;
    tracing::debug!(source_bytes = source.len(), "Source generated");

    let job_id = state
        .dispatcher
        .submit(RenderRequest::Generated {
            prompt: body.prompt,
            source,
        })
        .await?;
    Ok(accepted(job_id))
}

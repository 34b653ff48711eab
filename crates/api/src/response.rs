//! Shared response envelope types for API handlers.
//!
//! Everything under `/api/v1`, and the job submission endpoints, answer with
//! a `{ "data": ... }` envelope. The legacy `/progress` and `/image`
//! endpoints keep their bare shapes.

use prism_core::job::JobStatus;
use prism_core::types::JobId;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Payload of an accepted render submission.
#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub job_id: JobId,
    pub status: JobStatus,
}

//! Per-job records keyed by job id.
//!
//! Status transitions only move forward: once a job is terminal every
//! further transition is ignored, so late progress events or a racing
//! cancellation can never overwrite an outcome.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use prism_core::error::CoreError;
use prism_core::image::ImageResult;
use prism_core::job::JobStatus;
use prism_core::progress::PROGRESS_COMPLETE;
use prism_core::request::RenderMode;
use prism_core::types::{JobId, Timestamp};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Message of the conflict returned when admission control refuses a job.
pub const QUEUE_FULL: &str = "render queue is full";

#[derive(Debug)]
struct JobRecord {
    id: JobId,
    mode: RenderMode,
    status: JobStatus,
    progress: u8,
    error: Option<String>,
    result: Option<Arc<ImageResult>>,
    cancel: CancellationToken,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
}

impl JobRecord {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            mode: self.mode,
            status: self.status,
            progress: self.progress,
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Point-in-time view of one job, as served by the status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub mode: RenderMode,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, JobRecord>,
    /// Most recently admitted job, answered by `/progress` without a job id.
    latest: Option<JobId>,
}

/// Concurrent map of job records.
#[derive(Debug)]
pub struct JobRegistry {
    inner: RwLock<Inner>,
    max_retained: usize,
}

impl JobRegistry {
    /// Create an empty registry keeping at most `max_retained` terminal jobs.
    pub fn new(max_retained: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_retained,
        }
    }

    /// Admit a new `pending` job unless `capacity` non-terminal jobs exist.
    ///
    /// The check and the insert happen under one write lock, so concurrent
    /// submissions cannot overshoot the bound.
    pub async fn admit(
        &self,
        mode: RenderMode,
        cancel: CancellationToken,
        capacity: usize,
    ) -> Result<JobId, CoreError> {
        let mut inner = self.inner.write().await;
        let active = inner
            .jobs
            .values()
            .filter(|job| !job.status.is_terminal())
            .count();
        if active >= capacity {
            return Err(CoreError::Conflict(QUEUE_FULL.to_string()));
        }

        let id = JobId::new_v4();
        inner.jobs.insert(
            id,
            JobRecord {
                id,
                mode,
                status: JobStatus::Pending,
                progress: 0,
                error: None,
                result: None,
                cancel,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
            },
        );
        inner.latest = Some(id);
        Ok(id)
    }

    pub async fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        self.inner.read().await.jobs.get(&id).map(JobRecord::snapshot)
    }

    /// Snapshot of the most recently submitted job, if it is still retained.
    pub async fn latest(&self) -> Option<JobSnapshot> {
        let inner = self.inner.read().await;
        inner
            .latest
            .and_then(|id| inner.jobs.get(&id))
            .map(JobRecord::snapshot)
    }

    /// Every retained job, newest first.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<JobSnapshot> = inner.jobs.values().map(JobRecord::snapshot).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Number of pending and running jobs.
    pub async fn active_count(&self) -> usize {
        self.inner
            .read()
            .await
            .jobs
            .values()
            .filter(|job| !job.status.is_terminal())
            .count()
    }

    /// The finished image of job `id`.
    ///
    /// `Ok(None)` means the job exists but has not completed.
    pub async fn result(&self, id: JobId) -> Result<Option<Arc<ImageResult>>, CoreError> {
        let inner = self.inner.read().await;
        let job = inner.jobs.get(&id).ok_or_else(|| not_found(id))?;
        Ok(job.result.clone())
    }

    /// `pending -> running`. Returns `false` if the job is gone or was
    /// cancelled while it waited.
    pub async fn mark_running(&self, id: JobId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Running;
                job.started_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Raise the progress of a running job to `percent`.
    ///
    /// Lower values are ignored, so progress never decreases.
    pub async fn update_progress(&self, id: JobId, percent: u8) {
        let mut inner = self.inner.write().await;
        if let Some(job) = inner.jobs.get_mut(&id) {
            if job.status == JobStatus::Running {
                job.progress = job.progress.max(percent.min(PROGRESS_COMPLETE));
            }
        }
    }

    /// Record a successful outcome. Returns `false` if the job already ended.
    pub async fn complete(&self, id: JobId, image: Arc<ImageResult>) -> bool {
        self.finish(id, |job| {
            job.progress = PROGRESS_COMPLETE;
            job.result = Some(image);
            job.finish(JobStatus::Completed);
        })
        .await
    }

    /// Record a failure; progress stays where it was.
    pub async fn fail(&self, id: JobId, message: String) -> bool {
        self.finish(id, |job| {
            job.error = Some(message);
            job.finish(JobStatus::Failed);
        })
        .await
    }

    pub async fn mark_cancelled(&self, id: JobId) -> bool {
        self.finish(id, |job| job.finish(JobStatus::Cancelled)).await
    }

    /// Cancel a pending or running job.
    ///
    /// The record turns `cancelled` immediately; the job's task observes the
    /// token and stops its work.
    pub async fn cancel(&self, id: JobId) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or_else(|| not_found(id))?;
        if job.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job is already {} and cannot be cancelled",
                job.status
            )));
        }
        job.cancel.cancel();
        job.finish(JobStatus::Cancelled);
        drop(inner);
        self.evict_terminal().await;
        Ok(())
    }

    async fn finish<F>(&self, id: JobId, apply: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        let finished = {
            let mut inner = self.inner.write().await;
            match inner.jobs.get_mut(&id) {
                Some(job) if !job.status.is_terminal() => {
                    apply(job);
                    true
                }
                _ => false,
            }
        };
        if finished {
            self.evict_terminal().await;
        }
        finished
    }

    /// Drop the oldest terminal jobs beyond the retention limit. The latest
    /// submitted job is never evicted.
    async fn evict_terminal(&self) {
        let mut inner = self.inner.write().await;
        let latest = inner.latest;
        let mut terminal: Vec<(Timestamp, JobId)> = inner
            .jobs
            .values()
            .filter(|job| job.status.is_terminal() && Some(job.id) != latest)
            .map(|job| (job.finished_at.unwrap_or(job.created_at), job.id))
            .collect();
        if terminal.len() <= self.max_retained {
            return;
        }
        terminal.sort();
        let excess = terminal.len() - self.max_retained;
        for (_, id) in terminal.into_iter().take(excess) {
            inner.jobs.remove(&id);
            tracing::debug!(job_id = %id, "Evicted finished job");
        }
    }
}

fn not_found(id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }
}

//! Job dispatcher.
//!
//! Every accepted submission becomes one task on a [`TaskTracker`]. The task
//! waits for a worker permit, runs the job's work under a wall-clock timeout
//! and its own [`CancellationToken`], and records the outcome in the
//! [`JobRegistry`]. Per-job tokens are children of the dispatcher's shutdown
//! token, so shutdown reaches every job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use prism_core::builder::{self, SceneBuild};
use prism_core::error::CoreError;
use prism_core::image::{ImageFormat, ImageResult};
use prism_core::request::RenderRequest;
use prism_core::types::JobId;
use prism_engine::{RenderEngine, RenderError};
use prism_pipeline::DynamicCodePipeline;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::progress::{self, JobProgress};
use super::registry::JobRegistry;
use super::results::ResultStore;
use crate::config::JobConfig;

/// Why a job did not produce an image.
#[derive(Debug)]
enum JobFailure {
    Cancelled,
    Failed(String),
}

/// Accepts render requests and runs them in the background.
pub struct JobDispatcher {
    worker: Worker,
    capacity: usize,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

/// Everything a job task needs, cloned into each task.
#[derive(Clone)]
struct Worker {
    registry: Arc<JobRegistry>,
    results: Arc<ResultStore>,
    engine: Arc<dyn RenderEngine>,
    pipeline: Arc<DynamicCodePipeline>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
    output_format: ImageFormat,
}

impl JobDispatcher {
    pub fn new(
        config: &JobConfig,
        output_format: ImageFormat,
        engine: Arc<dyn RenderEngine>,
        pipeline: Arc<DynamicCodePipeline>,
    ) -> Self {
        Self {
            worker: Worker {
                registry: Arc::new(JobRegistry::new(config.max_retained_jobs)),
                results: Arc::new(ResultStore::new()),
                engine,
                pipeline,
                permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
                job_timeout: config.job_timeout,
                output_format,
            },
            capacity: config.capacity(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.worker.registry
    }

    pub fn results(&self) -> &Arc<ResultStore> {
        &self.worker.results
    }

    /// Validate `request`, admit a job for it and start it in the background.
    ///
    /// Scene construction happens here, so builder errors reach the caller
    /// and no job record is created for them.
    pub async fn submit(&self, request: RenderRequest) -> Result<JobId, CoreError> {
        if self.shutdown.is_cancelled() {
            return Err(CoreError::Conflict("server is shutting down".to_string()));
        }

        let mode = request.mode();
        let work = builder::build(&request)?;
        let cancel = self.shutdown.child_token();
        let job_id = self
            .worker
            .registry
            .admit(mode, cancel.clone(), self.capacity)
            .await?;

        tracing::info!(job_id = %job_id, mode = %mode, "Job submitted");
        self.tracker
            .spawn(self.worker.clone().run(job_id, work, cancel));
        Ok(job_id)
    }

    /// Cancel a pending or running job. Terminal jobs yield a conflict.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), CoreError> {
        self.worker.registry.cancel(job_id).await?;
        tracing::info!(job_id = %job_id, "Job cancellation requested");
        Ok(())
    }

    /// Refuse new jobs, cancel every job and wait up to `timeout` for their
    /// tasks to finish.
    pub async fn shutdown(&self, timeout: Duration) {
        self.shutdown.cancel();
        self.tracker.close();
        tracing::info!(remaining = self.tracker.len(), "Draining render jobs");

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Render jobs did not stop within shutdown timeout",
            );
        }
    }
}

impl Worker {
    async fn run(self, job_id: JobId, work: SceneBuild, cancel: CancellationToken) {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.registry.mark_cancelled(job_id).await;
                tracing::info!(job_id = %job_id, "Job cancelled while queued");
                return;
            }
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.registry.fail(job_id, "worker pool is closed".to_string()).await;
                    return;
                }
            },
        };

        if !self.registry.mark_running(job_id).await {
            return;
        }
        tracing::info!(job_id = %job_id, "Job started");
        let started = Instant::now();

        let (sink, rx) = JobProgress::channel(cancel.clone());
        let consumer = progress::spawn_consumer(self.registry.clone(), job_id, rx);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(JobFailure::Cancelled),
            result = tokio::time::timeout(self.job_timeout, self.execute(work, sink, permit)) => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(JobFailure::Failed(format!(
                        "job timed out after {}s",
                        self.job_timeout.as_secs_f64()
                    ))),
                }
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(image) => {
                // Apply every queued progress event before the job turns terminal.
                let _ = consumer.await;
                let image = Arc::new(image);
                if self.registry.complete(job_id, image.clone()).await {
                    self.results.publish(image).await;
                    tracing::info!(job_id = %job_id, elapsed_ms, "Job completed");
                }
            }
            Err(JobFailure::Cancelled) => {
                consumer.abort();
                self.registry.mark_cancelled(job_id).await;
                tracing::info!(job_id = %job_id, elapsed_ms, "Job cancelled");
            }
            Err(JobFailure::Failed(message)) => {
                // Stops a render thread that outlived the timeout; it keeps its permit until then.
                cancel.cancel();
                consumer.abort();
                tracing::warn!(job_id = %job_id, elapsed_ms, error = %message, "Job failed");
                self.registry.fail(job_id, message).await;
            }
        }
    }

    /// Produce the job's image. `permit` is released only when the work
    /// really stops: a render thread holds it until it returns, even after
    /// this future is dropped.
    async fn execute(
        &self,
        work: SceneBuild,
        sink: JobProgress,
        permit: OwnedSemaphorePermit,
    ) -> Result<ImageResult, JobFailure> {
        match work {
            SceneBuild::Scene(scene) => {
                let engine = self.engine.clone();
                let format = self.output_format;
                let rendered = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    engine.render(&scene, &sink)?.encode(format)
                })
                .await;

                match rendered {
                    Ok(Ok(image)) => Ok(image),
                    Ok(Err(RenderError::Cancelled)) => Err(JobFailure::Cancelled),
                    Ok(Err(e)) => Err(JobFailure::Failed(e.to_string())),
                    Err(e) if e.is_panic() => {
                        Err(JobFailure::Failed("render panicked".to_string()))
                    }
                    Err(e) => Err(JobFailure::Failed(e.to_string())),
                }
            }
            SceneBuild::Source(source) => {
                // Dropping the pipeline future kills the program, so the
                // permit can go with it.
                let _permit = permit;
                let artifact = self
                    .pipeline
                    .execute(&source, &sink)
                    .await
                    .map_err(|e| JobFailure::Failed(e.to_string()))?;
                tracing::debug!(
                    source_bytes = artifact.sanitized_source.len(),
                    stderr_bytes = artifact.stderr.len(),
                    "Generated program produced an image",
                );
                Ok(artifact.image)
            }
        }
    }
}

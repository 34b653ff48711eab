use std::sync::Arc;

use prism_engine::PathTracer;
use prism_pipeline::{DynamicCodePipeline, SourceGenerator};

use crate::config::ServerConfig;
use crate::jobs::{JobDispatcher, JobRegistry, ResultStore};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Accepts and runs render jobs.
    pub dispatcher: Arc<JobDispatcher>,
    /// Per-job status, progress and images (owned by the dispatcher).
    pub registry: Arc<JobRegistry>,
    /// Latest completed image (owned by the dispatcher).
    pub results: Arc<ResultStore>,
    /// Turns `/renderAI` prompts into program source.
    pub generator: Arc<dyn SourceGenerator>,
}

impl AppState {
    /// Wire the built-in path tracer and the dynamic code pipeline into a
    /// dispatcher configured from `config`.
    pub fn new(config: ServerConfig, generator: Arc<dyn SourceGenerator>) -> Self {
        let engine = Arc::new(PathTracer::new(
            config.render.asset_dir.clone(),
            config.render.limits,
        ));
        let pipeline = Arc::new(DynamicCodePipeline::new(config.pipeline.clone()));
        let dispatcher = Arc::new(JobDispatcher::new(
            &config.jobs,
            config.render.output_format,
            engine,
            pipeline,
        ));

        Self {
            registry: dispatcher.registry().clone(),
            results: dispatcher.results().clone(),
            dispatcher,
            config: Arc::new(config),
            generator,
        }
    }
}

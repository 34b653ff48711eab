//! The dynamic code pipeline: sanitize, materialize, compile, execute,
//! ingest, clean up.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;

use prism_core::image::ImageResult;
use prism_core::progress::{ProgressSink, PROGRESS_COMPLETE};
use regex::Regex;
use tokio::process::Command;

use crate::artifact::{ingest, ArtifactError};
use crate::compiler::CompilerConfig;
use crate::sandbox::SandboxPolicy;
use crate::sanitize::sanitize;
use crate::subprocess::{run_command, ProcessError, RunOptions};
use crate::workspace::Workspace;

/// stdout kept from the sandboxed program (it may carry the image).
pub const MAX_PROGRAM_STDOUT: usize = 64 * 1024 * 1024;

/// stderr kept from the sandboxed program.
pub const MAX_PROGRAM_STDERR: usize = 1024 * 1024;

/// stdout text kept on the artifact for diagnostics.
const STDOUT_PREVIEW_BYTES: usize = 4096;

/// `NN%` or `progress NN` anywhere in a stderr line.
static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:progress\D{0,3}(\d{1,3})|(\d{1,3})(?:\.\d+)?\s*%)")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Compile => "compile",
            Stage::Execute => "execute",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("generated source is empty after sanitization")]
    EmptySource,

    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("compiler could not be started: {0}")]
    CompilerUnavailable(#[source] std::io::Error),

    #[error("compilation failed (exit code {exit_code:?}): {stderr}")]
    Compilation {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("sandbox could not be set up: {0}")]
    Sandbox(#[source] std::io::Error),

    #[error("program failed (exit code {exit_code:?}, signal {signal:?}): {stderr}")]
    Execution {
        exit_code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },

    #[error("{stage} step timed out after {elapsed_ms}ms")]
    Timeout { stage: Stage, elapsed_ms: u64 },

    #[error("I/O error during {stage} step: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl PipelineError {
    fn from_process(stage: Stage, err: ProcessError) -> Self {
        match err {
            ProcessError::Spawn(e) => match stage {
                Stage::Compile => PipelineError::CompilerUnavailable(e),
                Stage::Execute => PipelineError::Sandbox(e),
            },
            ProcessError::Timeout { elapsed_ms } => PipelineError::Timeout { stage, elapsed_ms },
            ProcessError::Io(source) => PipelineError::Io { stage, source },
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub raw_text: String,
    pub sanitized_source: String,
    /// The first few KiB of the program's stdout.
    pub stdout: String,
    pub stderr: String,
    pub image: ImageResult,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent directory of per-job workspaces.
    pub work_dir: PathBuf,
    pub compiler: CompilerConfig,
    pub sandbox: SandboxPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("prism"),
            compiler: CompilerConfig::default(),
            sandbox: SandboxPolicy::default(),
        }
    }
}

/// Turns generated text into an image by compiling and running it.
#[derive(Debug, Clone)]
pub struct DynamicCodePipeline {
    config: PipelineConfig,
}

impl DynamicCodePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for `raw_text`.
    ///
    /// The workspace is removed on every exit path, including when this
    /// future is dropped mid-run (which also kills the running program).
    pub async fn execute(
        &self,
        raw_text: &str,
        progress: &dyn ProgressSink,
    ) -> Result<GeneratedArtifact, PipelineError> {
        let source = sanitize(raw_text);
        if source.is_empty() {
            return Err(PipelineError::EmptySource);
        }

        let workspace = Workspace::create(&self.config.work_dir).map_err(PipelineError::Workspace)?;
        let source_path = workspace
            .write_source(&source)
            .await
            .map_err(PipelineError::Workspace)?;
        let binary_path = workspace.binary_path();

        // ---- compile ----
        let started = Instant::now();
        let compiled = self
            .config
            .compiler
            .compile(&source_path, &binary_path, workspace.path())
            .await
            .map_err(|e| PipelineError::from_process(Stage::Compile, e))?;
        if !compiled.success() {
            tracing::info!(
                exit_code = ?compiled.exit_code,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Generated source failed to compile"
            );
            return Err(PipelineError::Compilation {
                exit_code: compiled.exit_code,
                stderr: compiled.stderr,
            });
        }
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated source compiled"
        );

        // ---- execute ----
        let mut cmd = Command::new(&binary_path);
        self.config
            .sandbox
            .apply(&mut cmd, workspace.path())
            .map_err(PipelineError::Sandbox)?;

        let options = RunOptions {
            timeout: self.config.sandbox.wall_timeout,
            max_stdout_bytes: MAX_PROGRAM_STDOUT,
            max_stderr_bytes: MAX_PROGRAM_STDERR,
            kill_process_group: true,
        };
        let started = Instant::now();
        let output = run_command(&mut cmd, options, |line| {
            if let Some(percent) = parse_progress(line) {
                progress.report(percent);
            }
        })
        .await
        .map_err(|e| PipelineError::from_process(Stage::Execute, e))?;

        if !output.success() {
            return Err(PipelineError::Execution {
                exit_code: output.exit_code,
                signal: output.signal,
                stderr: output.stderr,
            });
        }
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_bytes = output.stdout.len(),
            truncated = output.truncated,
            "Generated program finished"
        );

        // ---- ingest ----
        let image = ingest(workspace.path(), &output.stdout).await?;
        progress.report(PROGRESS_COMPLETE);

        let preview = &output.stdout[..output.stdout.len().min(STDOUT_PREVIEW_BYTES)];
        Ok(GeneratedArtifact {
            raw_text: raw_text.to_string(),
            sanitized_source: source,
            stdout: String::from_utf8_lossy(preview).into_owned(),
            stderr: output.stderr,
            image,
        })
    }
}

/// Percentage reported on a program's stderr line, if any.
pub fn parse_progress(line: &str) -> Option<u8> {
    let caps = PROGRESS_LINE.captures(line)?;
    let digits = caps.get(1).or_else(|| caps.get(2))?;
    let value: u8 = digits.as_str().parse().ok()?;
    (value <= PROGRESS_COMPLETE).then_some(value)
}

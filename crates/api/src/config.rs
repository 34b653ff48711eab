use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use prism_core::image::ImageFormat;
use prism_engine::RenderLimits;
use prism_pipeline::compiler::CompilerConfig;
use prism_pipeline::sandbox::SandboxPolicy;
use prism_pipeline::{GeneratorConfig, PipelineConfig};

/// A configuration value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs to stop (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jobs: JobConfig,
    pub render: RenderConfig,
    pub pipeline: PipelineConfig,
    pub generator: GeneratorConfig,
}

/// Scheduling limits of the job dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Jobs executing at the same time.
    pub max_concurrent_jobs: usize,
    /// Jobs allowed to wait for a worker on top of the running ones.
    pub max_queued_jobs: usize,
    /// Wall-clock budget of one job, queue wait excluded.
    pub job_timeout: Duration,
    /// Terminal jobs kept for status queries before the oldest are evicted.
    pub max_retained_jobs: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            max_queued_jobs: 8,
            job_timeout: Duration::from_secs(600),
            max_retained_jobs: 100,
        }
    }
}

impl JobConfig {
    /// Non-terminal jobs admitted before submissions are refused.
    pub fn capacity(&self) -> usize {
        self.max_concurrent_jobs.max(1) + self.max_queued_jobs
    }
}

/// Settings of the built-in rendering engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub limits: RenderLimits,
    /// Where image textures (e.g. `earthmap.jpg`) are looked up.
    pub asset_dir: PathBuf,
    pub output_format: ImageFormat,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            limits: RenderLimits::default(),
            asset_dir: PathBuf::from("assets"),
            output_format: ImageFormat::Png,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                                     |
    /// |--------------------------|---------------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                                   |
    /// | `PORT`                   | `8080`                                      |
    /// | `CORS_ORIGINS`           | `http://localhost:8080`                     |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                                        |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                                        |
    /// | `MAX_CONCURRENT_JOBS`    | `1`                                         |
    /// | `MAX_QUEUED_JOBS`        | `8`                                         |
    /// | `JOB_TIMEOUT_SECS`       | `600`                                       |
    /// | `MAX_RETAINED_JOBS`      | `100`                                       |
    /// | `RENDER_MAX_WIDTH`       | unset (no cap)                              |
    /// | `RENDER_MAX_SAMPLES`     | unset (no cap)                              |
    /// | `ASSET_DIR`              | `assets`                                    |
    /// | `OUTPUT_FORMAT`          | `png` (`png`, `jpeg`)                       |
    /// | `WORK_DIR`               | `$TMPDIR/prism`                             |
    /// | `COMPILER`               | `g++`                                       |
    /// | `COMPILER_FLAGS`         | `-std=c++17 -O2`                            |
    /// | `SCAFFOLD_INCLUDE_DIRS`  | `scaffold` (comma-separated)                |
    /// | `COMPILE_TIMEOUT_SECS`   | `60`                                        |
    /// | `EXEC_TIMEOUT_SECS`      | `120`                                       |
    /// | `SANDBOX_CPU_SECS`       | `60`                                        |
    /// | `SANDBOX_MEMORY_MB`      | `1024`                                      |
    /// | `SANDBOX_MAX_FILE_MB`    | `64`                                        |
    /// | `SANDBOX_MAX_OPEN_FILES` | `64`                                        |
    /// | `SANDBOX_ISOLATE`        | `true`                                      |
    /// | `SANDBOX_RESTRICT_FS`    | `true`                                      |
    /// | `GEMINI_API_KEY`         | unset (`/renderAI` answers 500)             |
    /// | `GEMINI_BASE_URL`        | `https://generativelanguage.googleapis.com` |
    /// | `GEMINI_MODEL`           | `gemini-2.0-flash-exp`                      |
    /// | `GENERATOR_TIMEOUT_SECS` | `25`                                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let cors_origins = env
            .string("CORS_ORIGINS", "http://localhost:8080")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let jobs = JobConfig {
            max_concurrent_jobs: env.parse("MAX_CONCURRENT_JOBS", 1)?,
            max_queued_jobs: env.parse("MAX_QUEUED_JOBS", 8)?,
            job_timeout: Duration::from_secs(env.parse("JOB_TIMEOUT_SECS", 600)?),
            max_retained_jobs: env.parse("MAX_RETAINED_JOBS", 100)?,
        };
        if jobs.max_concurrent_jobs == 0 {
            return Err(ConfigError {
                var: "MAX_CONCURRENT_JOBS",
                value: "0".into(),
                reason: "at least one worker is required".into(),
            });
        }

        let output_format = env.string("OUTPUT_FORMAT", "png");
        let render = RenderConfig {
            limits: RenderLimits {
                max_image_width: env.optional("RENDER_MAX_WIDTH")?,
                max_samples_per_pixel: env.optional("RENDER_MAX_SAMPLES")?,
            },
            asset_dir: PathBuf::from(env.string("ASSET_DIR", "assets")),
            output_format: ImageFormat::parse(&output_format).ok_or_else(|| ConfigError {
                var: "OUTPUT_FORMAT",
                value: output_format.clone(),
                reason: "expected png or jpeg".into(),
            })?,
        };

        let work_dir = (env.0)("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("prism"));
        let pipeline = PipelineConfig {
            work_dir,
            compiler: CompilerConfig {
                program: PathBuf::from(env.string("COMPILER", "g++")),
                flags: env
                    .string("COMPILER_FLAGS", "-std=c++17 -O2")
                    .split_whitespace()
                    .map(String::from)
                    .collect(),
                include_dirs: env
                    .string("SCAFFOLD_INCLUDE_DIRS", "scaffold")
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect(),
                timeout: Duration::from_secs(env.parse("COMPILE_TIMEOUT_SECS", 60)?),
            },
            sandbox: SandboxPolicy {
                wall_timeout: Duration::from_secs(env.parse("EXEC_TIMEOUT_SECS", 120)?),
                cpu_time_secs: env.parse("SANDBOX_CPU_SECS", 60)?,
                memory_bytes: env.parse::<u64>("SANDBOX_MEMORY_MB", 1024)? * 1024 * 1024,
                max_file_bytes: env.parse::<u64>("SANDBOX_MAX_FILE_MB", 64)? * 1024 * 1024,
                max_open_files: env.parse("SANDBOX_MAX_OPEN_FILES", 64)?,
                isolate_namespaces: env.parse("SANDBOX_ISOLATE", true)?,
                restrict_filesystem: env.parse("SANDBOX_RESTRICT_FS", true)?,
                ..SandboxPolicy::default()
            },
        };

        let defaults = GeneratorConfig::default();
        let generator = GeneratorConfig {
            api_key: (env.0)("GEMINI_API_KEY").filter(|key| !key.trim().is_empty()),
            base_url: env.string("GEMINI_BASE_URL", &defaults.base_url),
            model: env.string("GEMINI_MODEL", &defaults.model),
            timeout: Duration::from_secs(env.parse("GENERATOR_TIMEOUT_SECS", 25)?),
        };

        Ok(Self {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 8080)?,
            cors_origins,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: env.parse("SHUTDOWN_TIMEOUT_SECS", 30)?,
            jobs,
            render,
            pipeline,
            generator,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, var: &str, default: &str) -> String {
        (self.0)(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.optional(var)?.unwrap_or(default))
    }

    fn optional<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(var) {
            None => Ok(None),
            Some(value) => value.trim().parse().map(Some).map_err(|e: T::Err| ConfigError {
                var,
                value,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://localhost:8080"]);
        assert_eq!(config.jobs, JobConfig::default());
        assert_eq!(config.jobs.capacity(), 9);
        assert_eq!(config.render.output_format, ImageFormat::Png);
        assert_eq!(config.render.limits, RenderLimits::default());
        assert_eq!(config.pipeline.compiler.flags, vec!["-std=c++17", "-O2"]);
        assert_eq!(
            config.pipeline.compiler.include_dirs,
            vec![PathBuf::from("scaffold")]
        );
        assert!(config.pipeline.sandbox.isolate_namespaces);
        assert!(config.pipeline.sandbox.restrict_filesystem);
        assert_eq!(config.generator.api_key, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PORT", "9000"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("MAX_CONCURRENT_JOBS", "4"),
            ("MAX_QUEUED_JOBS", "0"),
            ("RENDER_MAX_WIDTH", "64"),
            ("OUTPUT_FORMAT", "jpg"),
            ("SANDBOX_MEMORY_MB", "256"),
            ("SANDBOX_ISOLATE", "false"),
            ("SANDBOX_RESTRICT_FS", "false"),
            ("GEMINI_API_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.jobs.capacity(), 4);
        assert_eq!(config.render.limits.max_image_width, Some(64));
        assert_eq!(config.render.output_format, ImageFormat::Jpeg);
        assert_eq!(config.pipeline.sandbox.memory_bytes, 256 * 1024 * 1024);
        assert!(!config.pipeline.sandbox.isolate_namespaces);
        assert!(!config.pipeline.sandbox.restrict_filesystem);
        assert_eq!(config.generator.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.var, "PORT");

        let err = load(&[("OUTPUT_FORMAT", "gif")]).unwrap_err();
        assert_eq!(err.var, "OUTPUT_FORMAT");

        let err = load(&[("MAX_CONCURRENT_JOBS", "0")]).unwrap_err();
        assert_eq!(err.var, "MAX_CONCURRENT_JOBS");
    }

    #[test]
    fn blank_api_key_counts_as_unset() {
        let config = load(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert_eq!(config.generator.api_key, None);
    }
}

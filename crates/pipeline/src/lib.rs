//! Dynamic code pipeline: turns generated program text into an image by
//! sanitizing, compiling and running it in a sandbox, plus the source
//! generator that produces that text from a prompt.

pub mod artifact;
pub mod compiler;
pub mod generator;
pub mod pipeline;
pub mod sandbox;
pub mod sanitize;
pub mod subprocess;
pub mod workspace;

pub use generator::{GeminiGenerator, GeneratorConfig, GeneratorError, SourceGenerator};
pub use pipeline::{DynamicCodePipeline, GeneratedArtifact, PipelineConfig, PipelineError};

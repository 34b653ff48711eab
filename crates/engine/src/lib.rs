//! Reference path-tracing engine behind the [`RenderEngine`] contract.
//!
//! The engine is synchronous and CPU bound; async callers run it on
//! `tokio::task::spawn_blocking`.

pub mod buffer;
mod bvh;
mod camera;
mod geometry;
mod material;
mod texture;
pub mod tracer;

use prism_core::progress::ProgressSink;
use prism_core::scene::SceneDescriptor;

pub use buffer::PixelBuffer;
pub use tracer::{PathTracer, RenderLimits};

/// Error type for rendering operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid scene: {0}")]
    InvalidScene(String),

    #[error("render cancelled")]
    Cancelled,

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Stable call contract of a rendering engine.
///
/// Implementations report non-decreasing progress through `progress`, end at
/// 100 on success, and return [`RenderError::Cancelled`] once
/// [`ProgressSink::is_cancelled`] turns true.
pub trait RenderEngine: Send + Sync {
    fn render(
        &self,
        scene: &SceneDescriptor,
        progress: &dyn ProgressSink,
    ) -> Result<PixelBuffer, RenderError>;
}

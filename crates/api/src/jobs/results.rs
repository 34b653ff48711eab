//! Latest completed image, shared by every reader.

use std::sync::Arc;

use prism_core::image::ImageResult;
use tokio::sync::RwLock;

/// Holds the most recently completed image.
///
/// Images are swapped whole behind an [`Arc`], so a reader either sees the
/// previous image or the new one, never a partially written buffer.
#[derive(Debug, Default)]
pub struct ResultStore {
    latest: RwLock<Option<Arc<ImageResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest image (last writer wins).
    pub async fn publish(&self, image: Arc<ImageResult>) {
        *self.latest.write().await = Some(image);
    }

    pub async fn latest(&self) -> Option<Arc<ImageResult>> {
        self.latest.read().await.clone()
    }
}

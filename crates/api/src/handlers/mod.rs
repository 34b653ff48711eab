pub mod jobs;
pub mod page;
pub mod render;
pub mod status;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use prism_core::image::ImageResult;

/// Serve encoded image bytes with their MIME type.
fn image_response(image: &ImageResult) -> Response {
    (
        [
            (CONTENT_TYPE, image.content_type()),
            (CACHE_CONTROL, "no-store"),
        ],
        image.bytes.clone(),
    )
        .into_response()
}

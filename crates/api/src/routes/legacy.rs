//! Root-level routes kept for existing browser clients.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{page, render, status};
use crate::state::AppState;

/// Routes mounted at the root.
///
/// ```text
/// GET    /            -> index
/// GET    /progress    -> progress
/// GET    /image       -> image
/// POST   /render      -> render
/// POST   /renderAI    -> render_ai
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::index))
        .route("/progress", get(status::progress))
        .route("/image", get(status::image))
        .route("/render", post(render::render))
        .route("/renderAI", post(render::render_ai))
}

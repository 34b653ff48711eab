pub mod health;
pub mod jobs;
pub mod legacy;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                          list
/// /jobs/{id}                     snapshot
/// /jobs/{id}/image               finished image
/// /jobs/{id}/cancel              cancel (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}

//! API routes and handlers.

mod cache;

use axum::{
    Router,
    routing::{get, post},
};

use super::state::AppState;

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let run_routes = Router::new()
        .route("/get", get(cache::get_value))
        .route("/set", post(cache::set_value))
        .route("/get-stale", get(cache::get_stale))
        .route("/get-stale-list", get(cache::get_stale_list))
        .route("/clear", post(cache::clear_run));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/run/{run_id}", run_routes)
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

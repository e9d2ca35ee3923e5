//! HTTP API for the cache coordinator.
//!
//! Workers reach the coordinating process through a small JSON API scoped by
//! run identifier:
//!
//! - `GET  /api/v1/run/{run_id}/get?key=..&sig=..&ttl=..`
//! - `POST /api/v1/run/{run_id}/set`
//! - `GET  /api/v1/run/{run_id}/get-stale?key=..`
//! - `GET  /api/v1/run/{run_id}/get-stale-list?prefix=..`
//! - `POST /api/v1/run/{run_id}/clear`

mod config;
mod error;
mod logging;
pub mod protocol;
mod routes;
mod state;

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError, LogFormat, LoggingConfig, ServerConfig, StorageConfig};
pub use error::ApiError;
pub use logging::{LoggingError, init as init_logging};
pub use routes::router;
pub use state::AppState;

/// Router with request tracing, as served by [`serve`].
pub fn app(state: AppState) -> Router {
    router(state).layer(TraceLayer::new_for_http())
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
}

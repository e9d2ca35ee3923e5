//! Cache operation handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::cache::EntrySnapshot;
use crate::ttl::Ttl;

use crate::server::{
    error::ApiError,
    protocol::{
        GetQuery, GetResponse, SetRequest, StaleListQuery, StaleListResponse, StaleQuery,
        StaleResponse,
    },
    state::AppState,
};

/// Fetch a value or claim its computation.
pub async fn get_value(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<GetResponse>, ApiError> {
    let ttl = match query.ttl.as_deref() {
        Some(text) => Ttl::parse(text)?,
        None => None,
    };
    let outcome = state
        .coordinator()
        .get(&query.key, &query.sig, ttl)
        .await?;
    let response = GetResponse::from_outcome(&query.key, outcome);

    tracing::debug!(run_id = %run_id, key = %query.key, ?response, "get");
    Ok(Json(response))
}

/// Finalize a claimed key with a value or an error.
pub async fn set_value(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(request): Json<SetRequest>,
) -> Result<Json<EntrySnapshot>, ApiError> {
    let (key, completion) = request.into_parts();
    let snapshot = state.coordinator().set(&key, completion).await?;

    tracing::debug!(run_id = %run_id, key = %key, state = %snapshot.state, "set");
    Ok(Json(snapshot))
}

pub async fn get_stale(
    State(state): State<AppState>,
    Query(query): Query<StaleQuery>,
) -> Json<StaleResponse> {
    Json(StaleResponse {
        value: state.coordinator().get_stale(&query.key),
    })
}

pub async fn get_stale_list(
    State(state): State<AppState>,
    Query(query): Query<StaleListQuery>,
) -> Json<StaleListResponse> {
    Json(StaleListResponse {
        values: state.coordinator().get_stale_list(&query.prefix),
    })
}

/// Forget every key of the current run.
pub async fn clear_run(State(state): State<AppState>, Path(run_id): Path<String>) -> StatusCode {
    state.coordinator().clear_run();
    tracing::info!(run_id = %run_id, "clear requested");
    StatusCode::NO_CONTENT
}

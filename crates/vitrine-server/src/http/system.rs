use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use vitrine_api::{ApiError, ApiErrorCode};
use vitrine_store::schema_version;

use crate::http::respond::{propagated_request_id, respond_err, respond_ok};
use crate::http::run_store;
use crate::AppState;

pub(crate) async fn health_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    respond_ok(
        &state,
        "/",
        started,
        &request_id,
        StatusCode::OK,
        json!({ "message": "Health checkup" }),
    )
    .await
}

pub(crate) async fn healthz_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    respond_ok(
        &state,
        "/healthz",
        started,
        &request_id,
        StatusCode::OK,
        json!({ "status": "ok" }),
    )
    .await
}

/// Ready when the schema version can be read back from the database.
pub(crate) async fn readyz_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let (status, body) = match run_store(&state, |store| store.with_read(schema_version)).await {
        Ok(version) => (
            StatusCode::OK,
            json!({ "status": "ready", "schemaVersion": version }),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "status": "unready", "reason": err.message }),
        ),
    };
    respond_ok(&state, "/readyz", started, &request_id, status, body).await
}

pub(crate) async fn route_not_found_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    respond_err(
        &state,
        "fallback",
        started,
        &request_id,
        ApiError::new(
            ApiErrorCode::RouteNotFound,
            "Route Not Found",
            Value::Null,
            "req-unknown",
        ),
    )
    .await
}

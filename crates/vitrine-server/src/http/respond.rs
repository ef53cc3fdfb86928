// SPDX-License-Identifier: Apache-2.0

//! Response plumbing shared by every handler: request ids, the error
//! envelope and its status mapping, and the success envelope.

use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use vitrine_api::{ApiError, ApiErrorCode};
use vitrine_store::{StoreError, StoreErrorKind};

use crate::AppState;

pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

/// Client-supplied `x-request-id` wins; otherwise mint one from the seed.
pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(ToString::to_string)
        .unwrap_or_else(|| make_request_id(state))
}

pub(crate) fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// One status per error code.
pub(crate) fn api_error_status(code: ApiErrorCode) -> StatusCode {
    match code {
        ApiErrorCode::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ApiErrorCode::InvalidQueryParameter | ApiErrorCode::InvalidJsonBody => {
            StatusCode::BAD_REQUEST
        }
        ApiErrorCode::NotAuthenticated
        | ApiErrorCode::AlreadyAuthenticated
        | ApiErrorCode::InvalidCredentials
        | ApiErrorCode::InvalidToken
        | ApiErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,
        ApiErrorCode::Forbidden | ApiErrorCode::UserBanned => StatusCode::FORBIDDEN,
        // Stock shortage is a 404 on the wire, matching the rest of the
        // order-placement failures.
        ApiErrorCode::NotFound | ApiErrorCode::RouteNotFound | ApiErrorCode::InsufficientStock => {
            StatusCode::NOT_FOUND
        }
        ApiErrorCode::DuplicateResource => StatusCode::CONFLICT,
        ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ApiErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn api_error_response(status: StatusCode, err: ApiError) -> Response {
    (status, Json(json!({ "error": err }))).into_response()
}

pub(crate) fn validation_error(message: impl Into<String>) -> ApiError {
    ApiError::new(
        ApiErrorCode::ValidationFailed,
        message,
        Value::Null,
        "req-unknown",
    )
}

/// Missing or mistyped fields count as validation; garbled bodies do not.
pub(crate) fn json_body_error(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => validation_error(err.body_text()),
        JsonRejection::MissingJsonContentType(err) => ApiError::new(
            ApiErrorCode::UnsupportedMediaType,
            err.body_text(),
            Value::Null,
            "req-unknown",
        ),
        other => ApiError::new(
            ApiErrorCode::InvalidJsonBody,
            other.body_text(),
            Value::Null,
            "req-unknown",
        ),
    }
}

pub(crate) fn store_error_to_api(err: &StoreError) -> ApiError {
    match err.kind {
        StoreErrorKind::NotFound => ApiError::not_found(err.message.clone()),
        StoreErrorKind::Conflict => ApiError::duplicate(err.message.clone()),
        StoreErrorKind::InsufficientStock => ApiError::new(
            ApiErrorCode::InsufficientStock,
            err.message.clone(),
            Value::Null,
            "req-unknown",
        ),
        StoreErrorKind::Invalid => validation_error(err.message.clone()),
        StoreErrorKind::Internal => ApiError::internal(err.message.clone()),
    }
}

#[must_use]
pub(crate) fn envelope(message: &str, payload: Option<Value>) -> Value {
    match payload {
        Some(payload) => json!({ "message": message, "payload": payload }),
        None => json!({ "message": message }),
    }
}

pub(crate) async fn respond_ok(
    state: &AppState,
    route: &'static str,
    started: Instant,
    request_id: &str,
    status: StatusCode,
    body: Value,
) -> Response {
    let resp = (status, Json(body)).into_response();
    state
        .metrics
        .observe_request(route, status, started.elapsed())
        .await;
    with_request_id(resp, request_id)
}

pub(crate) async fn respond_err(
    state: &AppState,
    route: &'static str,
    started: Instant,
    request_id: &str,
    err: ApiError,
) -> Response {
    let status = api_error_status(err.code);
    let resp = api_error_response(status, err.with_request_id(request_id));
    state
        .metrics
        .observe_request(route, status, started.elapsed())
        .await;
    with_request_id(resp, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use std::sync::Arc;

    fn fixture_state() -> AppState {
        AppState::new(
            vitrine_store::Store::open_in_memory().expect("in-memory store"),
            crate::ServerConfig::default(),
            Arc::new(crate::RecordingMailer::default()),
        )
    }

    #[test]
    fn request_ids_are_distinct_and_prefixed() {
        let state = fixture_state();
        let a = make_request_id(&state);
        let b = make_request_id(&state);
        assert!(a.starts_with("req-"));
        assert!(b.starts_with("req-"));
        assert_ne!(a, b);
    }

    #[test]
    fn propagated_request_id_prefers_the_header() {
        let state = fixture_state();
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "req-caller-1".parse().expect("header"));
        assert_eq!(propagated_request_id(&headers, &state), "req-caller-1");

        let empty = HeaderMap::new();
        assert!(propagated_request_id(&empty, &state).starts_with("req-"));
    }

    #[test]
    fn status_mapping_matches_the_wire_contract() {
        assert_eq!(
            api_error_status(ApiErrorCode::ValidationFailed),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            api_error_status(ApiErrorCode::NotAuthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            api_error_status(ApiErrorCode::Forbidden),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            api_error_status(ApiErrorCode::DuplicateResource),
            StatusCode::CONFLICT
        );
        assert_eq!(
            api_error_status(ApiErrorCode::InsufficientStock),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            api_error_status(ApiErrorCode::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn envelope_omits_missing_payload() {
        let with = envelope("Order placed", Some(json!({"order": 1})));
        assert_eq!(with["payload"]["order"], 1);
        let without = envelope("Order deleted", None);
        assert!(without.get("payload").is_none());
    }
}

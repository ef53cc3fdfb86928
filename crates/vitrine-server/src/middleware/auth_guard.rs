//! Session guards: the four route classes (logged-in, logged-out, admin,
//! customer) as middleware layered onto sub-routers.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;
use vitrine_api::{ApiError, ApiErrorCode};
use vitrine_auth::{session_token_from_cookie_header, verify_session};
use vitrine_store::{find_user_by_id, StoreErrorKind};

use crate::http::respond::{
    api_error_response, api_error_status, propagated_request_id, with_request_id,
};
use crate::http::run_store;
use crate::AppState;

/// Identity attached to the request once the session cookie checks out.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurrentUser {
    pub id: i64,
    pub is_admin: bool,
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    session_token_from_cookie_header(raw).map(str::to_string)
}

fn invalid_token_error() -> ApiError {
    ApiError::new(
        ApiErrorCode::InvalidToken,
        "Invalied access token",
        Value::Null,
        "req-unknown",
    )
}

/// Resolves the session cookie to an existing user.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let Some(token) = cookie_token(headers) else {
        return Err(ApiError::not_authenticated());
    };
    let claims = verify_session(&token, state.config.session_key.as_bytes())
        .map_err(|_| invalid_token_error())?;
    let user = run_store(state, move |store| {
        store.with_read(|conn| find_user_by_id(conn, claims.user_id))
    })
    .await
    .map_err(|err| match err.kind {
        // A session for a since-deleted user is just a dead token.
        StoreErrorKind::NotFound => invalid_token_error(),
        _ => ApiError::internal(err.message),
    })?;
    Ok(CurrentUser {
        id: user.id,
        is_admin: user.is_admin,
    })
}

fn guard_reject(state: &AppState, headers: &HeaderMap, err: ApiError) -> Response {
    let request_id = propagated_request_id(headers, state);
    let status = api_error_status(err.code);
    let resp = api_error_response(status, err.with_request_id(&request_id));
    with_request_id(resp, &request_id)
}

pub(crate) async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(current) => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Err(err) => guard_reject(&state, request.headers(), err),
    }
}

pub(crate) async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(current) if current.is_admin => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Ok(_) => guard_reject(
            &state,
            request.headers(),
            ApiError::forbidden("You are not admin"),
        ),
        Err(err) => guard_reject(&state, request.headers(), err),
    }
}

pub(crate) async fn require_customer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(current) if !current.is_admin => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Ok(_) => guard_reject(
            &state,
            request.headers(),
            ApiError::forbidden("Admin can not access this route"),
        ),
        Err(err) => guard_reject(&state, request.headers(), err),
    }
}

/// Logged-out guard: a verifiable session cookie means the caller must log
/// out first; a stale or garbled cookie passes.
pub(crate) async fn require_guest(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = cookie_token(request.headers()) {
        if verify_session(&token, state.config.session_key.as_bytes()).is_ok() {
            return guard_reject(
                &state,
                request.headers(),
                ApiError::already_authenticated(),
            );
        }
    }
    next.run(request).await
}

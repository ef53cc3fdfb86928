//! Cookie session login and logout.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use vitrine_api::{ApiError, ApiErrorCode};
use vitrine_auth::{clear_session_cookie, session_cookie, sign_session, verify_password};
use vitrine_model::EmailAddress;
use vitrine_store::{find_auth_by_email, find_user_by_id};

use crate::http::respond::{
    envelope, json_body_error, propagated_request_id, respond_err, respond_ok, store_error_to_api,
    validation_error,
};
use crate::http::run_store;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    email: String,
    password: String,
}

fn set_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/auth/login",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let email = match EmailAddress::parse(&body.email) {
        Ok(email) => email,
        Err(e) => {
            return respond_err(
                &state,
                "/auth/login",
                started,
                &request_id,
                validation_error(e.0),
            )
            .await
        }
    };

    let lookup = email.as_str().to_string();
    let auth = match run_store(&state, move |store| {
        store.with_read(|conn| find_auth_by_email(conn, &lookup))
    })
    .await
    {
        Ok(auth) => auth,
        Err(err) => {
            return respond_err(
                &state,
                "/auth/login",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    };

    let raw = body.password.clone();
    let stored = auth.password_hash.clone();
    let matches = match tokio::task::spawn_blocking(move || verify_password(&raw, &stored)).await {
        Ok(matches) => matches,
        Err(err) => {
            return respond_err(
                &state,
                "/auth/login",
                started,
                &request_id,
                ApiError::internal(format!("password check task failed: {err}")),
            )
            .await
        }
    };
    if !matches {
        return respond_err(
            &state,
            "/auth/login",
            started,
            &request_id,
            ApiError::new(
                ApiErrorCode::InvalidCredentials,
                "Password doesn't match",
                Value::Null,
                "req-unknown",
            ),
        )
        .await;
    }
    if auth.is_banned {
        return respond_err(
            &state,
            "/auth/login",
            started,
            &request_id,
            ApiError::new(
                ApiErrorCode::UserBanned,
                "User is banned, please contact support",
                Value::Null,
                "req-unknown",
            ),
        )
        .await;
    }

    let token = match sign_session(auth.id, state.config.session_key.as_bytes()) {
        Ok(token) => token,
        Err(err) => {
            return respond_err(
                &state,
                "/auth/login",
                started,
                &request_id,
                ApiError::internal(err.message),
            )
            .await
        }
    };
    let user = match run_store(&state, move |store| {
        store.with_read(|conn| find_user_by_id(conn, auth.id))
    })
    .await
    {
        Ok(user) => user,
        Err(err) => {
            return respond_err(
                &state,
                "/auth/login",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    };

    let body = envelope("User is logged in", Some(json!({ "user": user })));
    let response = respond_ok(
        &state,
        "/auth/login",
        started,
        &request_id,
        StatusCode::OK,
        body,
    )
    .await;
    set_cookie(response, &session_cookie(&token))
}

pub(crate) async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let response = respond_ok(
        &state,
        "/auth/logout",
        started,
        &request_id,
        StatusCode::OK,
        envelope("User is logged out", None),
    )
    .await;
    set_cookie(response, &clear_session_cookie())
}

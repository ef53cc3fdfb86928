//! User management, registration with email activation, and the profile
//! endpoints.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use vitrine_api::{parse_user_list_params, ApiError, ApiErrorCode};
use vitrine_auth::{
    hash_password, sign_activation, verify_activation, ActivationClaims, TokenErrorCode,
};
use vitrine_model::{EmailAddress, PersonName, RawPassword, UserName};
use vitrine_store::{
    create_user, delete_user_by_user_name, find_auth_by_email, find_user_by_id,
    get_user_by_user_name, list_users, toggle_ban_by_user_name, toggle_role_by_user_name,
    update_profile, NewUser, ProfileChanges, StoreErrorKind,
};

use crate::http::respond::{
    envelope, json_body_error, propagated_request_id, respond_err, respond_ok, store_error_to_api,
    validation_error,
};
use crate::http::run_store;
use crate::mail::activation_email;
use crate::middleware::CurrentUser;
use crate::uploads::{read_image_form, remove_stored_image, store_image};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewUserBody {
    first_name: String,
    last_name: String,
    user_name: String,
    email: String,
    password: String,
}

struct ParsedRegistration {
    first_name: PersonName,
    last_name: PersonName,
    user_name: UserName,
    email: EmailAddress,
    password: RawPassword,
}

fn parse_registration(body: &NewUserBody) -> Result<ParsedRegistration, ApiError> {
    let first_name =
        PersonName::parse(&body.first_name, "First name").map_err(|e| validation_error(e.0))?;
    let last_name =
        PersonName::parse(&body.last_name, "Last name").map_err(|e| validation_error(e.0))?;
    let user_name = UserName::parse(&body.user_name).map_err(|e| validation_error(e.0))?;
    let email = EmailAddress::parse(&body.email).map_err(|e| validation_error(e.0))?;
    let password = RawPassword::parse(&body.password).map_err(|e| validation_error(e.0))?;
    Ok(ParsedRegistration {
        first_name,
        last_name,
        user_name,
        email,
        password,
    })
}

async fn hash_password_blocking(password: &RawPassword) -> Result<String, ApiError> {
    let raw = password.as_str().to_string();
    match tokio::task::spawn_blocking(move || hash_password(&raw)).await {
        Ok(Ok(hash)) => Ok(hash),
        Ok(Err(err)) => Err(ApiError::internal(err.0)),
        Err(err) => Err(ApiError::internal(format!("hashing task failed: {err}"))),
    }
}

/// Pre-insert duplicate check; the same conflicts surface from `create_user`
/// when a racing registration wins.
async fn registration_conflict(
    state: &AppState,
    user_name: &UserName,
    email: &EmailAddress,
) -> Result<Option<ApiError>, ApiError> {
    let lookup = user_name.as_str().to_string();
    match run_store(state, move |store| {
        store.with_read(|conn| get_user_by_user_name(conn, &lookup))
    })
    .await
    {
        Ok(_) => {
            return Ok(Some(ApiError::duplicate(format!(
                "User already exist with this user name: {} (Try different user name)",
                user_name.as_str()
            ))))
        }
        Err(err) if err.kind == StoreErrorKind::NotFound => {}
        Err(err) => return Err(store_error_to_api(&err)),
    }

    let lookup = email.as_str().to_string();
    match run_store(state, move |store| {
        store.with_read(|conn| find_auth_by_email(conn, &lookup))
    })
    .await
    {
        Ok(_) => Ok(Some(ApiError::duplicate(format!(
            "User already exist with this email: {} (Try different email)",
            email.as_str()
        )))),
        Err(err) if err.kind == StoreErrorKind::NotFound => Ok(None),
        Err(err) => Err(store_error_to_api(&err)),
    }
}

pub(crate) async fn list_users_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let params = parse_user_list_params(&query, state.config.max_page_limit);
    match run_store(&state, move |store| {
        store.with_read(|conn| list_users(conn, &params))
    })
    .await
    {
        Ok(page) => {
            let body = envelope(
                "Users returned",
                Some(json!({
                    "users": page.items,
                    "currentPage": page.current_page,
                    "totalPages": page.total_pages,
                })),
            );
            respond_ok(&state, "/users", started, &request_id, StatusCode::OK, body).await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn get_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_name): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_read(|conn| get_user_by_user_name(conn, &user_name))
    })
    .await
    {
        Ok(user) => {
            let body = envelope("Single user returned", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users/:userName",
                started,
                &request_id,
                StatusCode::OK,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/:userName",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn create_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewUserBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/users",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let parsed = match parse_registration(&body) {
        Ok(parsed) => parsed,
        Err(err) => return respond_err(&state, "/users", started, &request_id, err).await,
    };
    let password_hash = match hash_password_blocking(&parsed.password).await {
        Ok(hash) => hash,
        Err(err) => return respond_err(&state, "/users", started, &request_id, err).await,
    };
    let input = NewUser {
        first_name: parsed.first_name,
        last_name: parsed.last_name,
        user_name: parsed.user_name,
        email: parsed.email,
        password_hash,
        image: None,
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| create_user(conn, &input))
    })
    .await
    {
        Ok(user) => {
            let body = envelope("User created", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users",
                started,
                &request_id,
                StatusCode::CREATED,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn delete_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_name): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_write(|conn| delete_user_by_user_name(conn, &user_name))
    })
    .await
    {
        Ok(user) => {
            remove_stored_image(&state.config.public_dir, &user.image);
            let body = envelope("Single user deleted", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users/:userName",
                started,
                &request_id,
                StatusCode::OK,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/:userName",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn toggle_ban_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_name): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_write(|conn| toggle_ban_by_user_name(conn, &user_name))
    })
    .await
    {
        Ok(user) => {
            let body = envelope("User status is updated", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users/updateBan/:userName",
                started,
                &request_id,
                StatusCode::OK,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/updateBan/:userName",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn toggle_role_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_name): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_write(|conn| toggle_role_by_user_name(conn, &user_name))
    })
    .await
    {
        Ok(user) => {
            let body = envelope("User status is updated", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users/updateRole/:userName",
                started,
                &request_id,
                StatusCode::OK,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/updateRole/:userName",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

/// Registration stores nothing; the activation token carries the whole
/// pending account.
pub(crate) async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewUserBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/users/process-register",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let parsed = match parse_registration(&body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return respond_err(&state, "/users/process-register", started, &request_id, err).await
        }
    };
    match registration_conflict(&state, &parsed.user_name, &parsed.email).await {
        Ok(None) => {}
        Ok(Some(err)) | Err(err) => {
            return respond_err(&state, "/users/process-register", started, &request_id, err).await
        }
    }
    let password_hash = match hash_password_blocking(&parsed.password).await {
        Ok(hash) => hash,
        Err(err) => {
            return respond_err(&state, "/users/process-register", started, &request_id, err).await
        }
    };
    let token = match sign_activation(
        parsed.first_name.as_str(),
        parsed.last_name.as_str(),
        parsed.user_name.as_str(),
        parsed.email.as_str(),
        &password_hash,
        state.config.activation_key.as_bytes(),
    ) {
        Ok(token) => token,
        Err(err) => {
            return respond_err(
                &state,
                "/users/process-register",
                started,
                &request_id,
                ApiError::internal(err.message),
            )
            .await
        }
    };
    let activation_url = format!("{}{token}", state.config.activation_url_base);
    let message = activation_email(
        &state.config.smtp_from,
        parsed.email.as_str(),
        parsed.first_name.as_str(),
        &activation_url,
    );
    if let Err(err) = state.mailer.send(message).await {
        return respond_err(
            &state,
            "/users/process-register",
            started,
            &request_id,
            ApiError::internal(format!("could not send activation email: {}", err.0)),
        )
        .await;
    }
    respond_ok(
        &state,
        "/users/process-register",
        started,
        &request_id,
        StatusCode::OK,
        envelope("Check your Email to activate your account", None),
    )
    .await
}

fn new_user_from_claims(claims: &ActivationClaims) -> Result<NewUser, ApiError> {
    let first_name =
        PersonName::parse(&claims.first_name, "First name").map_err(|e| validation_error(e.0))?;
    let last_name =
        PersonName::parse(&claims.last_name, "Last name").map_err(|e| validation_error(e.0))?;
    let user_name = UserName::parse(&claims.user_name).map_err(|e| validation_error(e.0))?;
    let email = EmailAddress::parse(&claims.email).map_err(|e| validation_error(e.0))?;
    Ok(NewUser {
        first_name,
        last_name,
        user_name,
        email,
        password_hash: claims.password_hash.clone(),
        image: None,
    })
}

pub(crate) async fn activate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let claims = match verify_activation(&token, state.config.activation_key.as_bytes()) {
        Ok(claims) => claims,
        Err(err) => {
            let api = match err.code {
                TokenErrorCode::Expired => ApiError::new(
                    ApiErrorCode::TokenExpired,
                    "expired token",
                    Value::Null,
                    "req-unknown",
                ),
                _ => ApiError::new(
                    ApiErrorCode::InvalidToken,
                    "Invalid token",
                    Value::Null,
                    "req-unknown",
                ),
            };
            return respond_err(
                &state,
                "/users/activate/:token",
                started,
                &request_id,
                api,
            )
            .await;
        }
    };
    let input = match new_user_from_claims(&claims) {
        Ok(input) => input,
        Err(err) => {
            return respond_err(&state, "/users/activate/:token", started, &request_id, err).await
        }
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| create_user(conn, &input))
    })
    .await
    {
        Ok(_user) => {
            respond_ok(
                &state,
                "/users/activate/:token",
                started,
                &request_id,
                StatusCode::CREATED,
                envelope("User activated", None),
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/activate/:token",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_read(|conn| find_user_by_id(conn, current.id))
    })
    .await
    {
        Ok(user) => {
            let body = envelope("User profile returned", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users/user/profile",
                started,
                &request_id,
                StatusCode::OK,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/user/profile",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn update_profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let form = match read_image_form(multipart, state.config.upload_max_bytes).await {
        Ok(form) => form,
        Err(err) => {
            return respond_err(&state, "/users/user/profile", started, &request_id, err).await
        }
    };

    let mut changes = ProfileChanges::default();
    if let Some(first) = form.fields.get("firstName") {
        changes.first_name = match PersonName::parse(first, "First name") {
            Ok(name) => Some(name),
            Err(e) => {
                return respond_err(
                    &state,
                    "/users/user/profile",
                    started,
                    &request_id,
                    validation_error(e.0),
                )
                .await
            }
        };
    }
    if let Some(last) = form.fields.get("lastName") {
        changes.last_name = match PersonName::parse(last, "Last name") {
            Ok(name) => Some(name),
            Err(e) => {
                return respond_err(
                    &state,
                    "/users/user/profile",
                    started,
                    &request_id,
                    validation_error(e.0),
                )
                .await
            }
        };
    }

    let mut replaced_image = None;
    if let Some(image) = form.image {
        let existing = match run_store(&state, move |store| {
            store.with_read(|conn| find_user_by_id(conn, current.id))
        })
        .await
        {
            Ok(user) => user,
            Err(err) => {
                return respond_err(
                    &state,
                    "/users/user/profile",
                    started,
                    &request_id,
                    store_error_to_api(&err),
                )
                .await
            }
        };
        let stored = match store_image(
            &state.config.public_dir,
            "users",
            &image.file_name,
            &image.bytes,
        ) {
            Ok(stored) => stored,
            Err(err) => {
                return respond_err(&state, "/users/user/profile", started, &request_id, err).await
            }
        };
        changes.image = Some(stored);
        replaced_image = Some(existing.image);
    }

    match run_store(&state, move |store| {
        store.with_write(|conn| update_profile(conn, current.id, &changes))
    })
    .await
    {
        Ok(user) => {
            if let Some(old) = replaced_image {
                remove_stored_image(&state.config.public_dir, &old);
            }
            let body = envelope("User profile updated", Some(json!({ "user": user })));
            respond_ok(
                &state,
                "/users/user/profile",
                started,
                &request_id,
                StatusCode::OK,
                body,
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/users/user/profile",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

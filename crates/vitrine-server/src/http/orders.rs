// SPDX-License-Identifier: Apache-2.0

//! Order listing, placement, and admin status management.
//!
//! Order ids arrive as raw path segments; a non-numeric id reads as an order
//! that does not exist, not as a malformed request.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use vitrine_api::{parse_page_params, ApiError};
use vitrine_model::{OrderItem, OrderStatus};
use vitrine_store::{
    delete_order_by_id, get_order_by_id, list_orders, orders_by_buyer, place_order,
    update_order_status, StoreErrorKind,
};

use crate::http::respond::{
    envelope, json_body_error, propagated_request_id, respond_err, respond_ok, store_error_to_api,
    validation_error,
};
use crate::http::run_store;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaceOrderBody {
    order_items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    status: String,
}

fn parse_order_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::not_found(format!("Order not found with this id: {raw}")))
}

pub(crate) async fn list_orders_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let params = parse_page_params(&query, state.config.max_page_limit);
    match run_store(&state, move |store| {
        store.with_read(|conn| list_orders(conn, &params))
    })
    .await
    {
        Ok(page) => {
            let body = envelope(
                "Orders returned",
                Some(json!({
                    "orders": page.items,
                    "currentPage": page.current_page,
                    "totalPages": page.total_pages,
                })),
            );
            respond_ok(&state, "/orders", started, &request_id, StatusCode::OK, body).await
        }
        Err(err) => {
            respond_err(
                &state,
                "/orders",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn get_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let id = match parse_order_id(&raw_id) {
        Ok(id) => id,
        Err(err) => return respond_err(&state, "/orders/:id", started, &request_id, err).await,
    };
    match run_store(&state, move |store| {
        store.with_read(|conn| get_order_by_id(conn, id))
    })
    .await
    {
        Ok(order) => {
            let body = envelope("Order returned", Some(json!({ "order": order })));
            respond_ok(
                &state,
                "/orders/:id",
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
                "/orders/:id",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn delete_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let id = match parse_order_id(&raw_id) {
        Ok(id) => id,
        Err(err) => return respond_err(&state, "/orders/:id", started, &request_id, err).await,
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| delete_order_by_id(conn, id))
    })
    .await
    {
        Ok(()) => {
            respond_ok(
                &state,
                "/orders/:id",
                started,
                &request_id,
                StatusCode::OK,
                envelope("Order deleted", None),
            )
            .await
        }
        Err(err) => {
            respond_err(
                &state,
                "/orders/:id",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn update_order_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let id = match parse_order_id(&raw_id) {
        Ok(id) => id,
        Err(err) => return respond_err(&state, "/orders/:id", started, &request_id, err).await,
    };
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/orders/:id",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let status = match OrderStatus::parse(&body.status) {
        Ok(status) => status,
        Err(e) => {
            return respond_err(
                &state,
                "/orders/:id",
                started,
                &request_id,
                validation_error(e.0),
            )
            .await
        }
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| update_order_status(conn, id, status))
    })
    .await
    {
        Ok(order) => {
            let body = envelope(
                "Order status updated successfully",
                Some(json!({ "order": order })),
            );
            respond_ok(
                &state,
                "/orders/:id",
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
                "/orders/:id",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn my_orders_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_read(|conn| orders_by_buyer(conn, current.id))
    })
    .await
    {
        Ok(orders) => {
            let body = envelope("Orders returned", Some(json!({ "orders": orders })));
            respond_ok(
                &state,
                "/orders/user",
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
                "/orders/user",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn place_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<PlaceOrderBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/orders",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    if body.order_items.is_empty() {
        return respond_err(
            &state,
            "/orders",
            started,
            &request_id,
            validation_error("Order items are required"),
        )
        .await;
    }

    let items: Vec<OrderItem> = body.order_items;
    match run_store(&state, move |store| {
        store.with_write(|conn| place_order(conn, current.id, &items))
    })
    .await
    {
        Ok(order) => {
            let body = envelope(
                "Order placed successfully, and stock updated",
                Some(json!({ "order": order })),
            );
            respond_ok(
                &state,
                "/orders",
                started,
                &request_id,
                StatusCode::CREATED,
                body,
            )
            .await
        }
        Err(err) => {
            // A rejected line item reads as a missing resource on this route,
            // matching the lookup failures place_order itself reports.
            let api = if err.kind == StoreErrorKind::Invalid {
                ApiError::not_found(err.message.clone())
            } else {
                store_error_to_api(&err)
            };
            respond_err(&state, "/orders", started, &request_id, api).await
        }
    }
}

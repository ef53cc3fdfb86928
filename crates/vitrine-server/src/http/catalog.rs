// SPDX-License-Identifier: Apache-2.0

//! Product and category endpoints.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use vitrine_api::{parse_page_params, parse_product_list_params, ApiError};
use vitrine_model::{
    CategoryTitle, Description, Price, ProductTitle, Quantity, ShippingFee, SoldCount,
};
use vitrine_store::{
    create_category, create_product, delete_category_by_slug, delete_product_by_slug,
    get_category_by_slug, get_product_by_slug, list_categories, list_products,
    update_category_by_slug, update_product_by_slug, NewProduct, ProductChanges,
};

use crate::http::respond::{
    envelope, json_body_error, propagated_request_id, respond_err, respond_ok, store_error_to_api,
    validation_error,
};
use crate::http::run_store;
use crate::uploads::{read_image_form, remove_stored_image, store_image};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateProductBody {
    title: String,
    price: f64,
    category: i64,
    description: String,
    quantity: i64,
    #[serde(default)]
    sold: Option<i64>,
    #[serde(default)]
    shipping: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryBody {
    title: String,
}

pub(crate) async fn list_products_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let params = parse_product_list_params(&query, state.config.max_page_limit);
    match run_store(&state, move |store| {
        store.with_read(|conn| list_products(conn, &params))
    })
    .await
    {
        Ok(page) => {
            let body = envelope(
                "Products returned",
                Some(json!({
                    "products": page.items,
                    "currentPage": page.current_page,
                    "totalPages": page.total_pages,
                })),
            );
            respond_ok(&state, "/products", started, &request_id, StatusCode::OK, body).await
        }
        Err(err) => {
            respond_err(
                &state,
                "/products",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn get_product_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_read(|conn| get_product_by_slug(conn, &slug))
    })
    .await
    {
        Ok(product) => {
            let body = envelope("Single product returned", Some(json!({ "product": product })));
            respond_ok(
                &state,
                "/products/:slug",
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
                "/products/:slug",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn create_product_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateProductBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/products",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let input = match parse_new_product(&body) {
        Ok(input) => input,
        Err(err) => return respond_err(&state, "/products", started, &request_id, err).await,
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| create_product(conn, &input))
    })
    .await
    {
        Ok(product) => {
            let body = envelope("Single product created", Some(json!({ "product": product })));
            respond_ok(
                &state,
                "/products",
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
                "/products",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn update_product_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let form = match read_image_form(multipart, state.config.upload_max_bytes).await {
        Ok(form) => form,
        Err(err) => {
            return respond_err(&state, "/products/:slug", started, &request_id, err).await
        }
    };
    let mut changes = match product_changes_from(&form.fields) {
        Ok(changes) => changes,
        Err(err) => {
            return respond_err(&state, "/products/:slug", started, &request_id, err).await
        }
    };

    // When the image is replaced the previous file goes away after the row
    // update sticks.
    let mut replaced_image = None;
    if let Some(image) = form.image {
        let lookup = slug.clone();
        let existing = match run_store(&state, move |store| {
            store.with_read(|conn| get_product_by_slug(conn, &lookup))
        })
        .await
        {
            Ok(product) => product,
            Err(err) => {
                return respond_err(
                    &state,
                    "/products/:slug",
                    started,
                    &request_id,
                    store_error_to_api(&err),
                )
                .await
            }
        };
        let stored = match store_image(
            &state.config.public_dir,
            "products",
            &image.file_name,
            &image.bytes,
        ) {
            Ok(stored) => stored,
            Err(err) => {
                return respond_err(&state, "/products/:slug", started, &request_id, err).await
            }
        };
        changes.image = Some(stored);
        replaced_image = Some(existing.image);
    }

    match run_store(&state, move |store| {
        store.with_write(|conn| update_product_by_slug(conn, &slug, &changes))
    })
    .await
    {
        Ok(product) => {
            if let Some(old) = replaced_image {
                remove_stored_image(&state.config.public_dir, &old);
            }
            let body = envelope("Single product updated", Some(json!({ "product": product })));
            respond_ok(
                &state,
                "/products/:slug",
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
                "/products/:slug",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn delete_product_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_write(|conn| delete_product_by_slug(conn, &slug))
    })
    .await
    {
        Ok(product) => {
            remove_stored_image(&state.config.public_dir, &product.image);
            let body = envelope("Single product deleted", Some(json!({ "product": product })));
            respond_ok(
                &state,
                "/products/:slug",
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
                "/products/:slug",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

fn parse_new_product(body: &CreateProductBody) -> Result<NewProduct, ApiError> {
    let title = ProductTitle::parse(&body.title).map_err(|e| validation_error(e.0))?;
    let price = Price::parse(body.price).map_err(|e| validation_error(e.0))?;
    let description = Description::parse(&body.description).map_err(|e| validation_error(e.0))?;
    let quantity = Quantity::parse(body.quantity).map_err(|e| validation_error(e.0))?;
    let sold = match body.sold {
        Some(sold) => Some(SoldCount::parse(sold).map_err(|e| validation_error(e.0))?),
        None => None,
    };
    let shipping = match body.shipping {
        Some(fee) => Some(ShippingFee::parse(fee).map_err(|e| validation_error(e.0))?),
        None => None,
    };
    Ok(NewProduct {
        title,
        price,
        category_id: body.category,
        description,
        quantity,
        sold,
        shipping,
        image: None,
    })
}

fn product_changes_from(fields: &HashMap<String, String>) -> Result<ProductChanges, ApiError> {
    let mut changes = ProductChanges::default();
    if let Some(title) = fields.get("title") {
        changes.title = Some(ProductTitle::parse(title).map_err(|e| validation_error(e.0))?);
    }
    if let Some(price) = fields.get("price") {
        let price: f64 = price
            .trim()
            .parse()
            .map_err(|_| validation_error("Price must be a positive number"))?;
        changes.price = Some(Price::parse(price).map_err(|e| validation_error(e.0))?);
    }
    if let Some(category) = fields.get("category") {
        changes.category_id = Some(
            category
                .trim()
                .parse()
                .map_err(|_| validation_error("Category id must be a number"))?,
        );
    }
    if let Some(description) = fields.get("description") {
        changes.description =
            Some(Description::parse(description).map_err(|e| validation_error(e.0))?);
    }
    if let Some(quantity) = fields.get("quantity") {
        let quantity: i64 = quantity
            .trim()
            .parse()
            .map_err(|_| validation_error("Quantity must be a positive number greater than 0"))?;
        changes.quantity = Some(Quantity::parse(quantity).map_err(|e| validation_error(e.0))?);
    }
    if let Some(sold) = fields.get("sold") {
        let sold: i64 = sold
            .trim()
            .parse()
            .map_err(|_| validation_error("Sold must be greater than or equal to 0"))?;
        changes.sold = Some(SoldCount::parse(sold).map_err(|e| validation_error(e.0))?);
    }
    if let Some(shipping) = fields.get("shipping") {
        let fee: f64 = shipping
            .trim()
            .parse()
            .map_err(|_| validation_error("Shipping must be greater than or equal to 0"))?;
        changes.shipping = Some(ShippingFee::parse(fee).map_err(|e| validation_error(e.0))?);
    }
    Ok(changes)
}

pub(crate) async fn list_categories_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let params = parse_page_params(&query, state.config.max_page_limit);
    match run_store(&state, move |store| {
        store.with_read(|conn| list_categories(conn, &params))
    })
    .await
    {
        Ok(page) => {
            let body = envelope(
                "Categories returned",
                Some(json!({
                    "categories": page.items,
                    "currentPage": page.current_page,
                    "totalPages": page.total_pages,
                })),
            );
            respond_ok(
                &state,
                "/categories",
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
                "/categories",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn get_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_read(|conn| get_category_by_slug(conn, &slug))
    })
    .await
    {
        Ok(category) => {
            let body = envelope(
                "Single category returned",
                Some(json!({ "category": category })),
            );
            respond_ok(
                &state,
                "/categories/:slug",
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
                "/categories/:slug",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn create_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CategoryBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/categories",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let title = match CategoryTitle::parse(&body.title) {
        Ok(title) => title,
        Err(e) => {
            return respond_err(
                &state,
                "/categories",
                started,
                &request_id,
                validation_error(e.0),
            )
            .await
        }
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| create_category(conn, &title))
    })
    .await
    {
        Ok(category) => {
            let body = envelope(
                "Single category created",
                Some(json!({ "category": category })),
            );
            respond_ok(
                &state,
                "/categories",
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
                "/categories",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn update_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    body: Result<Json<CategoryBody>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return respond_err(
                &state,
                "/categories/:slug",
                started,
                &request_id,
                json_body_error(rejection),
            )
            .await
        }
    };
    let title = match CategoryTitle::parse(&body.title) {
        Ok(title) => title,
        Err(e) => {
            return respond_err(
                &state,
                "/categories/:slug",
                started,
                &request_id,
                validation_error(e.0),
            )
            .await
        }
    };
    match run_store(&state, move |store| {
        store.with_write(|conn| update_category_by_slug(conn, &slug, &title))
    })
    .await
    {
        Ok(category) => {
            let body = envelope(
                "Single category updated",
                Some(json!({ "category": category })),
            );
            respond_ok(
                &state,
                "/categories/:slug",
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
                "/categories/:slug",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

pub(crate) async fn delete_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    match run_store(&state, move |store| {
        store.with_write(|conn| delete_category_by_slug(conn, &slug))
    })
    .await
    {
        Ok(category) => {
            let body = envelope(
                "Single category deleted",
                Some(json!({ "category": category })),
            );
            respond_ok(
                &state,
                "/categories/:slug",
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
                "/categories/:slug",
                started,
                &request_id,
                store_error_to_api(&err),
            )
            .await
        }
    }
}

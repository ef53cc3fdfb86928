#![forbid(unsafe_code)]

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::services::ServeDir;
use vitrine_store::Store;

mod config;
mod http;
mod mail;
mod middleware;
mod telemetry;
mod uploads;

pub use config::{validate_startup_config_contract, ServerConfig};
pub use mail::{activation_email, EmailMessage, MailError, Mailer, RecordingMailer, TracingMailer};

pub const CRATE_NAME: &str = "vitrine-server";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<ServerConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub(crate) metrics: Arc<telemetry::RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store, config: ServerConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            config: Arc::new(config),
            mailer,
            metrics: Arc::new(telemetry::RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// Routes requiring different session classes live on separate sub-routers so
/// each guard wraps only its own method set; merging keeps shared paths like
/// `/products/` serving public reads next to admin writes.
pub fn build_router(state: AppState) -> Router {
    let products = Router::new()
        .route("/", get(http::catalog::list_products_handler))
        .route("/:slug", get(http::catalog::get_product_handler))
        .merge(
            Router::new()
                .route("/", post(http::catalog::create_product_handler))
                .route(
                    "/:slug",
                    put(http::catalog::update_product_handler)
                        .delete(http::catalog::delete_product_handler),
                )
                .route_layer(from_fn_with_state(state.clone(), middleware::require_admin)),
        );

    let categories = Router::new()
        .route("/", get(http::catalog::list_categories_handler))
        .route("/:slug", get(http::catalog::get_category_handler))
        .merge(
            Router::new()
                .route("/", post(http::catalog::create_category_handler))
                .route(
                    "/:slug",
                    put(http::catalog::update_category_handler)
                        .delete(http::catalog::delete_category_handler),
                )
                .route_layer(from_fn_with_state(state.clone(), middleware::require_admin)),
        );

    let users = Router::new()
        .route(
            "/",
            get(http::users::list_users_handler).post(http::users::create_user_handler),
        )
        .route(
            "/:userName",
            get(http::users::get_user_handler).delete(http::users::delete_user_handler),
        )
        .route("/updateBan/:userName", put(http::users::toggle_ban_handler))
        .route(
            "/updateRole/:userName",
            put(http::users::toggle_role_handler),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_admin))
        .merge(
            Router::new()
                .route("/process-register", post(http::users::register_handler))
                .route("/activate/:token", get(http::users::activate_handler))
                .route_layer(from_fn_with_state(state.clone(), middleware::require_guest)),
        )
        .merge(
            Router::new()
                .route(
                    "/user/profile",
                    get(http::users::profile_handler).put(http::users::update_profile_handler),
                )
                .route_layer(from_fn_with_state(
                    state.clone(),
                    middleware::require_session,
                )),
        );

    let auth = Router::new()
        .route("/login", post(http::auth::login_handler))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_guest))
        .merge(
            Router::new()
                .route("/logout", post(http::auth::logout_handler))
                .route_layer(from_fn_with_state(
                    state.clone(),
                    middleware::require_session,
                )),
        );

    let orders = Router::new()
        .route("/", get(http::orders::list_orders_handler))
        .route(
            "/:id",
            get(http::orders::get_order_handler)
                .put(http::orders::update_order_status_handler)
                .delete(http::orders::delete_order_handler),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_admin))
        .merge(
            Router::new()
                .route("/", post(http::orders::place_order_handler))
                .route("/user", get(http::orders::my_orders_handler))
                .route_layer(from_fn_with_state(
                    state.clone(),
                    middleware::require_customer,
                )),
        );

    Router::new()
        .route("/", get(http::system::health_handler))
        .route("/healthz", get(http::system::healthz_handler))
        .route("/readyz", get(http::system::readyz_handler))
        .route("/metrics", get(telemetry::metrics_handler))
        .nest("/products", products)
        .nest("/categories", categories)
        .nest("/users", users)
        .nest("/auth", auth)
        .nest("/orders", orders)
        .nest_service("/public", ServeDir::new(state.config.public_dir.clone()))
        .fallback(http::system::route_not_found_handler)
        .layer(from_fn_with_state(state.clone(), middleware::cors_middleware))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state)
}

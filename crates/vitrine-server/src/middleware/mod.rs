mod auth_guard;
mod cors;
mod request_tracing;

pub(crate) use auth_guard::{
    require_admin, require_customer, require_guest, require_session, CurrentUser,
};
pub(crate) use cors::cors_middleware;
pub(crate) use request_tracing::request_tracing_middleware;

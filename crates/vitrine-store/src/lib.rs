// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! SQLite persistence for the storefront.
//!
//! One read-write connection behind a mutex; repositories are free functions
//! over `&Connection` so callers decide the locking and blocking strategy.
//! Everything that must be atomic (order placement) runs inside a single
//! transaction and commits or rolls back as a whole.

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

mod catalog;
mod orders;
mod pagination;
mod schema;
mod users;

pub use catalog::{
    create_category, create_product, delete_category_by_slug, delete_product_by_slug,
    get_category_by_slug, get_product_by_slug, list_categories, list_products,
    update_category_by_slug, update_product_by_slug, NewProduct, ProductChanges,
};
pub use orders::{
    delete_order_by_id, get_order_by_id, list_orders, orders_by_buyer, place_order,
    update_order_status,
};
pub use schema::{init_schema, schema_version, SCHEMA_VERSION};
pub use users::{
    create_user, delete_user_by_user_name, find_auth_by_email, find_user_by_id,
    get_user_by_user_name, list_users, toggle_ban_by_user_name, toggle_role_by_user_name,
    update_profile, AuthUser, NewUser, ProfileChanges,
};

pub const CRATE_NAME: &str = "vitrine-store";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    Conflict,
    InsufficientStock,
    Invalid,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::NotFound,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Conflict,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn insufficient_stock(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::InsufficientStock,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Invalid,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: StoreErrorKind::Internal,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::internal(e.to_string())
    }
}

/// One page of a listing, with the page arithmetic already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: i64,
    pub total_pages: i64,
}

/// Handle to the database: a single read-write connection behind a mutex.
///
/// Cloning is cheap; all clones share the connection. Callers on async
/// runtimes are expected to enter through `spawn_blocking`.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_read<R>(
        &self,
        f: impl FnOnce(&Connection) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::internal("store mutex poisoned"))?;
        f(&guard)
    }

    pub fn with_write<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::internal("store mutex poisoned"))?;
        f(&mut guard)
    }
}

/// RFC 3339 UTC timestamp, second precision, as stored in every row.
pub(crate) fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// `%` and `_` are wildcards inside LIKE; `!` is the escape character the
// queries declare with ESCAPE '!'.
pub(crate) fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '!' | '%' | '_' => {
                out.push('!');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// SPDX-License-Identifier: Apache-2.0

use crate::StoreError;
use rusqlite::{params, Connection};

pub const SCHEMA_VERSION: i64 = 1;

/// Creates the tables and indexes if absent and applies the per-connection
/// pragmas. Foreign keys stay on for the connection's whole lifetime; the
/// single shared connection means this runs exactly once per process.
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA foreign_keys=ON;
        PRAGMA busy_timeout=5000;
        CREATE TABLE IF NOT EXISTS shop_meta (
          k TEXT PRIMARY KEY,
          v TEXT NOT NULL
        ) WITHOUT ROWID;
        CREATE TABLE IF NOT EXISTS categories (
          id INTEGER PRIMARY KEY,
          title TEXT NOT NULL UNIQUE,
          slug TEXT NOT NULL UNIQUE,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS products (
          id INTEGER PRIMARY KEY,
          title TEXT NOT NULL UNIQUE,
          slug TEXT NOT NULL UNIQUE,
          price REAL NOT NULL,
          image TEXT NOT NULL,
          category_id INTEGER NOT NULL REFERENCES categories(id),
          description TEXT NOT NULL,
          quantity INTEGER NOT NULL,
          sold INTEGER NOT NULL DEFAULT 0,
          shipping REAL NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS users (
          id INTEGER PRIMARY KEY,
          first_name TEXT NOT NULL,
          last_name TEXT NOT NULL,
          user_name TEXT NOT NULL UNIQUE,
          email TEXT NOT NULL UNIQUE,
          password_hash TEXT NOT NULL,
          image TEXT NOT NULL,
          is_admin INTEGER NOT NULL DEFAULT 0,
          is_banned INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS orders (
          id INTEGER PRIMARY KEY,
          buyer_id INTEGER NOT NULL REFERENCES users(id),
          amount REAL NOT NULL,
          total_products INTEGER NOT NULL,
          status TEXT NOT NULL DEFAULT 'Not Processed',
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS order_items (
          id INTEGER PRIMARY KEY,
          order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
          product_id INTEGER NOT NULL REFERENCES products(id),
          qty INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_category_id ON products(category_id);
        CREATE INDEX IF NOT EXISTS idx_products_price ON products(price);
        CREATE INDEX IF NOT EXISTS idx_orders_buyer_id ON orders(buyer_id);
        CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);
        ",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO shop_meta (k, v) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let raw: String = conn.query_row(
        "SELECT v FROM shop_meta WHERE k = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    raw.parse::<i64>()
        .map_err(|e| StoreError::internal(format!("schema_version is not an integer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_records_the_version() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert_eq!(schema_version(&conn).expect("version"), SCHEMA_VERSION);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("init");
        let result = conn.execute(
            "INSERT INTO products (title, slug, price, image, category_id, description, quantity, created_at, updated_at)
             VALUES ('Ghost', 'ghost', 1.0, 'img', 999, 'no category', 1, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err(), "insert with dangling category must fail");
    }
}

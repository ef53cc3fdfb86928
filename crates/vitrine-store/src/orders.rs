// SPDX-License-Identifier: Apache-2.0

use crate::pagination::{page_window, table_count};
use crate::{now_utc, Page, StoreError};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use vitrine_api::PageParams;
use vitrine_model::{BuyerRef, Order, OrderItem, OrderLine, OrderProductRef, OrderStatus};

const ORDER_COLUMNS: &str =
    "o.id, o.amount, o.total_products, o.status, o.created_at, u.user_name, u.email";

struct OrderHead {
    id: i64,
    amount: f64,
    total_products: i64,
    status: String,
    created_at: String,
    user_name: String,
    email: String,
}

fn head_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderHead> {
    Ok(OrderHead {
        id: row.get(0)?,
        amount: row.get(1)?,
        total_products: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        user_name: row.get(5)?,
        email: row.get(6)?,
    })
}

fn order_lines(conn: &Connection, order_id: i64) -> Result<Vec<OrderLine>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT oi.qty, p.id, p.title, p.price, p.shipping, p.description, p.image \
         FROM order_items oi JOIN products p ON p.id = oi.product_id \
         WHERE oi.order_id = ?1 ORDER BY oi.id ASC",
    )?;
    let lines = stmt
        .query_map(params![order_id], |row| {
            Ok(OrderLine {
                qty: row.get(0)?,
                product: OrderProductRef {
                    id: row.get(1)?,
                    title: row.get(2)?,
                    price: row.get(3)?,
                    shipping: row.get(4)?,
                    description: row.get(5)?,
                    image: row.get(6)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn assemble(conn: &Connection, head: OrderHead) -> Result<Order, StoreError> {
    // Only statuses written through `OrderStatus` can be in the column.
    let status = OrderStatus::parse(&head.status).map_err(|e| StoreError::internal(e.0))?;
    Ok(Order {
        id: head.id,
        buyer: BuyerRef {
            user_name: head.user_name,
            email: head.email,
        },
        order_items: order_lines(conn, head.id)?,
        amount: head.amount,
        total_products: head.total_products,
        status,
        created_at: head.created_at,
    })
}

pub fn list_orders(conn: &Connection, params: &PageParams) -> Result<Page<Order>, StoreError> {
    let count = table_count(conn, "orders")?;
    let window = page_window(count, params.page, params.limit);

    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders o JOIN users u ON u.id = o.buyer_id \
         ORDER BY o.id ASC LIMIT ?1 OFFSET ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let heads = stmt
        .query_map(params![params.limit, window.offset], head_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    if heads.is_empty() {
        return Err(StoreError::not_found("There are no orders in database"));
    }
    let mut items = Vec::with_capacity(heads.len());
    for head in heads {
        items.push(assemble(conn, head)?);
    }
    Ok(Page {
        items,
        current_page: window.page,
        total_pages: window.total_pages,
    })
}

pub fn get_order_by_id(conn: &Connection, id: i64) -> Result<Order, StoreError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders o JOIN users u ON u.id = o.buyer_id WHERE o.id = ?1"
    );
    match conn.query_row(&sql, params![id], head_from_row) {
        Ok(head) => assemble(conn, head),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::not_found(format!(
            "Order not found with this id: {id}"
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn orders_by_buyer(conn: &Connection, buyer_id: i64) -> Result<Vec<Order>, StoreError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders o JOIN users u ON u.id = o.buyer_id \
         WHERE o.buyer_id = ?1 ORDER BY o.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let heads = stmt
        .query_map(params![buyer_id], head_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    if heads.is_empty() {
        return Err(StoreError::not_found(format!(
            "There are no orders for this user ID: {buyer_id}"
        )));
    }
    let mut orders = Vec::with_capacity(heads.len());
    for head in heads {
        orders.push(assemble(conn, head)?);
    }
    Ok(orders)
}

pub fn delete_order_by_id(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let deleted = conn.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(StoreError::not_found(format!(
            "Order not found with this id: {id}"
        )));
    }
    Ok(())
}

pub fn update_order_status(
    conn: &Connection,
    id: i64,
    status: OrderStatus,
) -> Result<Order, StoreError> {
    let updated = conn.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_utc(), id],
    )?;
    if updated == 0 {
        return Err(StoreError::not_found(format!(
            "Order not found with this id: {id}"
        )));
    }
    get_order_by_id(conn, id)
}

/// Places an order as one transaction: stock checks, the order row and its
/// items, and the stock decrements commit together or not at all.
///
/// Requested quantities accumulate per product before the stock check, so an
/// order repeating a product cannot drive its quantity negative.
pub fn place_order(
    conn: &mut Connection,
    buyer_id: i64,
    items: &[OrderItem],
) -> Result<Order, StoreError> {
    let tx = conn.transaction()?;

    let buyer_found: i64 = tx.query_row(
        "SELECT COUNT(*) FROM users WHERE id = ?1",
        params![buyer_id],
        |row| row.get(0),
    )?;
    if buyer_found == 0 {
        return Err(StoreError::not_found(format!(
            "User not found with this id: {buyer_id}"
        )));
    }

    let mut amount = 0.0_f64;
    let mut total_products = 0_i64;
    let mut requested: BTreeMap<i64, i64> = BTreeMap::new();
    {
        let mut product_stmt =
            tx.prepare("SELECT price, shipping, quantity FROM products WHERE id = ?1")?;
        for item in items {
            let (price, shipping, quantity): (f64, f64, i64) =
                match product_stmt.query_row(params![item.product], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                }) {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        return Err(StoreError::not_found(format!(
                            "Product not found with this id: {}",
                            item.product
                        )));
                    }
                    Err(e) => return Err(e.into()),
                };
            if item.qty <= 0 {
                return Err(StoreError::invalid("Quantity must be positve number"));
            }
            let asked = requested.entry(item.product).or_insert(0);
            *asked += item.qty;
            if quantity < *asked {
                return Err(StoreError::insufficient_stock(format!(
                    "Not enough stock of product with this id: {}",
                    item.product
                )));
            }
            amount += item.qty as f64 * (price + shipping);
            total_products += item.qty;
        }
    }

    let now = now_utc();
    tx.execute(
        "INSERT INTO orders (buyer_id, amount, total_products, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            buyer_id,
            amount,
            total_products,
            OrderStatus::default().as_str(),
            now
        ],
    )?;
    let order_id = tx.last_insert_rowid();
    {
        let mut item_stmt = tx
            .prepare("INSERT INTO order_items (order_id, product_id, qty) VALUES (?1, ?2, ?3)")?;
        let mut stock_stmt = tx.prepare(
            "UPDATE products SET quantity = quantity - ?1, sold = sold + ?1, updated_at = ?2 \
             WHERE id = ?3",
        )?;
        for item in items {
            item_stmt.execute(params![order_id, item.product, item.qty])?;
            stock_stmt.execute(params![item.qty, now, item.product])?;
        }
    }

    let order = get_order_by_id(&tx, order_id)?;
    tx.commit()?;
    Ok(order)
}

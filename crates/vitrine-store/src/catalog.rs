// SPDX-License-Identifier: Apache-2.0

use crate::pagination::{page_window, table_count};
use crate::{escape_like, is_constraint_violation, now_utc, Page, StoreError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use vitrine_api::{PageParams, ProductListParams};
use vitrine_model::{
    Category, CategoryRef, CategoryTitle, Description, Price, Product, ProductTitle, Quantity,
    ShippingFee, Slug, SoldCount, DEFAULT_PRODUCT_IMAGE,
};

const PRODUCT_COLUMNS: &str = "p.id, p.title, p.slug, p.price, p.image, p.description, \
     p.quantity, p.sold, p.shipping, c.id, c.title";

pub struct NewProduct {
    pub title: ProductTitle,
    pub price: Price,
    pub category_id: i64,
    pub description: Description,
    pub quantity: Quantity,
    pub sold: Option<SoldCount>,
    pub shipping: Option<ShippingFee>,
    pub image: Option<String>,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Default)]
pub struct ProductChanges {
    pub title: Option<ProductTitle>,
    pub price: Option<Price>,
    pub category_id: Option<i64>,
    pub description: Option<Description>,
    pub quantity: Option<Quantity>,
    pub sold: Option<SoldCount>,
    pub shipping: Option<ShippingFee>,
    pub image: Option<String>,
}

fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        price: row.get(3)?,
        image: row.get(4)?,
        description: row.get(5)?,
        quantity: row.get(6)?,
        sold: row.get(7)?,
        shipping: row.get(8)?,
        category: CategoryRef {
            id: row.get(9)?,
            title: row.get(10)?,
        },
    })
}

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn slug_for(title: &str) -> Result<Slug, StoreError> {
    let slug = Slug::from_title(title);
    if slug.as_str().is_empty() {
        return Err(StoreError::invalid(
            "Title must contain at least one letter or number",
        ));
    }
    Ok(slug)
}

fn category_exists(conn: &Connection, category_id: i64) -> Result<(), StoreError> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE id = ?1",
        params![category_id],
        |row| row.get(0),
    )?;
    if found == 0 {
        return Err(StoreError::not_found(format!(
            "Category not found with this id: {category_id}"
        )));
    }
    Ok(())
}

/// The page count runs over the whole table while the search and price
/// filters only narrow the returned rows; a page with no rows is reported
/// as not found.
pub fn list_products(
    conn: &Connection,
    params: &ProductListParams,
) -> Result<Page<Product>, StoreError> {
    let count = table_count(conn, "products")?;
    let window = page_window(count, params.page, params.limit);

    let pattern = format!("%{}%", escape_like(&params.search));
    let mut sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p JOIN categories c ON c.id = p.category_id"
    );
    sql.push_str(" WHERE (p.title LIKE ? ESCAPE '!' OR p.description LIKE ? ESCAPE '!')");
    sql.push_str(" AND p.price > ? AND p.price < ?");
    sql.push_str(&format!(
        " ORDER BY p.price {}, p.id ASC",
        params.sort_price.as_sql()
    ));
    sql.push_str(" LIMIT ? OFFSET ?");

    let sql_params: Vec<Value> = vec![
        Value::Text(pattern.clone()),
        Value::Text(pattern),
        Value::Real(params.min_price),
        Value::Real(params.max_price),
        Value::Integer(params.limit),
        Value::Integer(window.offset),
    ];
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(sql_params.iter()), product_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    if items.is_empty() {
        return Err(StoreError::not_found("There are no products in database"));
    }
    Ok(Page {
        items,
        current_page: window.page,
        total_pages: window.total_pages,
    })
}

pub fn get_product_by_slug(conn: &Connection, slug: &str) -> Result<Product, StoreError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p JOIN categories c ON c.id = p.category_id \
         WHERE p.slug = ?1"
    );
    match conn.query_row(&sql, params![slug], product_from_row) {
        Ok(product) => Ok(product),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::not_found(format!(
            "Product not found with this slug: {slug}"
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn create_product(conn: &Connection, input: &NewProduct) -> Result<Product, StoreError> {
    let slug = slug_for(input.title.as_str())?;
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE title = ?1 OR slug = ?2",
        params![input.title.as_str(), slug.as_str()],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(StoreError::conflict(format!(
            "Product already exist with this title: {} (Try different title)",
            input.title
        )));
    }
    category_exists(conn, input.category_id)?;

    let now = now_utc();
    conn.execute(
        "INSERT INTO products (title, slug, price, image, category_id, description, quantity, \
         sold, shipping, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            input.title.as_str(),
            slug.as_str(),
            input.price.value(),
            input
                .image
                .as_deref()
                .unwrap_or(DEFAULT_PRODUCT_IMAGE),
            input.category_id,
            input.description.as_str(),
            input.quantity.value(),
            input.sold.map_or(0, |s| s.value()),
            input.shipping.map_or(0.0, |s| s.value()),
            now,
        ],
    )?;
    get_product_by_slug(conn, slug.as_str())
}

pub fn update_product_by_slug(
    conn: &Connection,
    slug: &str,
    changes: &ProductChanges,
) -> Result<Product, StoreError> {
    let existing_id: i64 = match conn.query_row(
        "SELECT id FROM products WHERE slug = ?1",
        params![slug],
        |row| row.get(0),
    ) {
        Ok(id) => id,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(StoreError::not_found(format!(
                "Product not found with this slug: {slug}"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut set_parts: Vec<String> = Vec::new();
    let mut sql_params: Vec<Value> = Vec::new();
    let mut final_slug = slug.to_string();

    // A title change re-derives the slug, so both columns move together.
    if let Some(title) = &changes.title {
        let new_slug = slug_for(title.as_str())?;
        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM products WHERE (title = ?1 OR slug = ?2) AND id != ?3",
            params![title.as_str(), new_slug.as_str(), existing_id],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(StoreError::conflict(format!(
                "Product already exist with this title: {title} (Try different title)"
            )));
        }
        set_parts.push("title = ?".to_string());
        sql_params.push(Value::Text(title.as_str().to_string()));
        set_parts.push("slug = ?".to_string());
        sql_params.push(Value::Text(new_slug.as_str().to_string()));
        final_slug = new_slug.into_inner();
    }
    if let Some(price) = changes.price {
        set_parts.push("price = ?".to_string());
        sql_params.push(Value::Real(price.value()));
    }
    if let Some(category_id) = changes.category_id {
        category_exists(conn, category_id)?;
        set_parts.push("category_id = ?".to_string());
        sql_params.push(Value::Integer(category_id));
    }
    if let Some(description) = &changes.description {
        set_parts.push("description = ?".to_string());
        sql_params.push(Value::Text(description.as_str().to_string()));
    }
    if let Some(quantity) = changes.quantity {
        set_parts.push("quantity = ?".to_string());
        sql_params.push(Value::Integer(quantity.value()));
    }
    if let Some(sold) = changes.sold {
        set_parts.push("sold = ?".to_string());
        sql_params.push(Value::Integer(sold.value()));
    }
    if let Some(shipping) = changes.shipping {
        set_parts.push("shipping = ?".to_string());
        sql_params.push(Value::Real(shipping.value()));
    }
    if let Some(image) = &changes.image {
        set_parts.push("image = ?".to_string());
        sql_params.push(Value::Text(image.clone()));
    }
    set_parts.push("updated_at = ?".to_string());
    sql_params.push(Value::Text(now_utc()));
    sql_params.push(Value::Integer(existing_id));

    let sql = format!(
        "UPDATE products SET {} WHERE id = ?",
        set_parts.join(", ")
    );
    conn.execute(&sql, params_from_iter(sql_params.iter()))?;
    get_product_by_slug(conn, &final_slug)
}

pub fn delete_product_by_slug(conn: &Connection, slug: &str) -> Result<Product, StoreError> {
    let product = get_product_by_slug(conn, slug)?;
    conn.execute("DELETE FROM products WHERE id = ?1", params![product.id])
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::conflict("Product is referenced by existing orders")
            } else {
                e.into()
            }
        })?;
    Ok(product)
}

pub fn list_categories(
    conn: &Connection,
    params: &PageParams,
) -> Result<Page<Category>, StoreError> {
    let count = table_count(conn, "categories")?;
    let window = page_window(count, params.page, params.limit);

    let mut stmt = conn.prepare(
        "SELECT id, title, slug, created_at, updated_at FROM categories \
         ORDER BY id ASC LIMIT ?1 OFFSET ?2",
    )?;
    let items = stmt
        .query_map(params![params.limit, window.offset], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    if items.is_empty() {
        return Err(StoreError::not_found(
            "There are no categories in database",
        ));
    }
    Ok(Page {
        items,
        current_page: window.page,
        total_pages: window.total_pages,
    })
}

pub fn get_category_by_slug(conn: &Connection, slug: &str) -> Result<Category, StoreError> {
    match conn.query_row(
        "SELECT id, title, slug, created_at, updated_at FROM categories WHERE slug = ?1",
        params![slug],
        category_from_row,
    ) {
        Ok(category) => Ok(category),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::not_found(format!(
            "Category not found with this slug: {slug}"
        ))),
        Err(e) => Err(e.into()),
    }
}

fn category_slug_taken(conn: &Connection, slug: &Slug) -> Result<(), StoreError> {
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE slug = ?1",
        params![slug.as_str()],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(StoreError::conflict(format!(
            "Category already exists with this title: {slug} (Try different title)"
        )));
    }
    Ok(())
}

pub fn create_category(conn: &Connection, title: &CategoryTitle) -> Result<Category, StoreError> {
    let slug = slug_for(title.as_str())?;
    category_slug_taken(conn, &slug)?;

    let now = now_utc();
    conn.execute(
        "INSERT INTO categories (title, slug, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![title.as_str(), slug.as_str(), now],
    )?;
    get_category_by_slug(conn, slug.as_str())
}

/// The uniqueness check runs before the target lookup, so renaming a missing
/// category to a taken title reports the conflict, not the missing row.
pub fn update_category_by_slug(
    conn: &Connection,
    old_slug: &str,
    new_title: &CategoryTitle,
) -> Result<Category, StoreError> {
    let new_slug = slug_for(new_title.as_str())?;
    category_slug_taken(conn, &new_slug)?;

    let updated = conn.execute(
        "UPDATE categories SET title = ?1, slug = ?2, updated_at = ?3 WHERE slug = ?4",
        params![new_title.as_str(), new_slug.as_str(), now_utc(), old_slug],
    )?;
    if updated == 0 {
        return Err(StoreError::not_found(format!(
            "Category not found with this slug: {old_slug}"
        )));
    }
    get_category_by_slug(conn, new_slug.as_str())
}

pub fn delete_category_by_slug(conn: &Connection, slug: &str) -> Result<Category, StoreError> {
    let category = get_category_by_slug(conn, slug)?;
    conn.execute("DELETE FROM categories WHERE id = ?1", params![category.id])
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::conflict("Category is referenced by existing products")
            } else {
                e.into()
            }
        })?;
    Ok(category)
}

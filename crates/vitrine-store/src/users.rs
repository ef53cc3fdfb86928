use crate::pagination::{page_window, table_count};
use crate::{escape_like, is_constraint_violation, now_utc, Page, StoreError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use vitrine_api::UserListParams;
use vitrine_model::{EmailAddress, PersonName, User, UserName, DEFAULT_USER_IMAGE};

const USER_COLUMNS: &str = "id, first_name, last_name, user_name, email, image, is_admin, is_banned";

pub struct NewUser {
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub user_name: UserName,
    pub email: EmailAddress,
    pub password_hash: String,
    pub image: Option<String>,
}

/// Partial profile update; `None` leaves the stored value alone.
#[derive(Default)]
pub struct ProfileChanges {
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
    pub image: Option<String>,
}

/// Credential row for the login check. The hash stays inside the server;
/// the public `User` shape never carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub password_hash: String,
    pub is_banned: bool,
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        user_name: row.get(3)?,
        email: row.get(4)?,
        image: row.get(5)?,
        is_admin: row.get(6)?,
        is_banned: row.get(7)?,
        orders: Vec::new(),
    })
}

pub(crate) fn orders_of(conn: &Connection, user_id: i64) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM orders WHERE buyer_id = ?1 ORDER BY id ASC")?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn with_orders(conn: &Connection, mut user: User) -> Result<User, StoreError> {
    user.orders = orders_of(conn, user.id)?;
    Ok(user)
}

pub fn list_users(conn: &Connection, params: &UserListParams) -> Result<Page<User>, StoreError> {
    let count = table_count(conn, "users")?;
    let window = page_window(count, params.page, params.limit);

    let pattern = format!("%{}%", escape_like(&params.search));
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE (first_name LIKE ?1 ESCAPE '!' OR email LIKE ?1 ESCAPE '!') \
         ORDER BY id ASC LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let base = stmt
        .query_map(params![pattern, params.limit, window.offset], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    if base.is_empty() {
        return Err(StoreError::not_found("There are no users in database"));
    }
    let mut items = Vec::with_capacity(base.len());
    for user in base {
        items.push(with_orders(conn, user)?);
    }
    Ok(Page {
        items,
        current_page: window.page,
        total_pages: window.total_pages,
    })
}

pub fn get_user_by_user_name(conn: &Connection, user_name: &str) -> Result<User, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_name = ?1");
    match conn.query_row(&sql, params![user_name], user_from_row) {
        Ok(user) => with_orders(conn, user),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::not_found(format!(
            "User not found with this user name: {user_name}"
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn find_user_by_id(conn: &Connection, id: i64) -> Result<User, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    match conn.query_row(&sql, params![id], user_from_row) {
        Ok(user) => with_orders(conn, user),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::not_found(format!(
            "User not found with this ID: {id}"
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn find_auth_by_email(conn: &Connection, email: &str) -> Result<AuthUser, StoreError> {
    match conn.query_row(
        "SELECT id, password_hash, is_banned FROM users WHERE email = ?1",
        params![email],
        |row| {
            Ok(AuthUser {
                id: row.get(0)?,
                password_hash: row.get(1)?,
                is_banned: row.get(2)?,
            })
        },
    ) {
        Ok(auth) => Ok(auth),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            Err(StoreError::not_found("User not found with this email"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Duplicate user names win over duplicate emails when both collide.
pub fn create_user(conn: &Connection, input: &NewUser) -> Result<User, StoreError> {
    let name_taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE user_name = ?1",
        params![input.user_name.as_str()],
        |row| row.get(0),
    )?;
    if name_taken > 0 {
        return Err(StoreError::conflict(format!(
            "User already exist with this user name: {} (Try different user name)",
            input.user_name
        )));
    }
    let email_taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![input.email.as_str()],
        |row| row.get(0),
    )?;
    if email_taken > 0 {
        return Err(StoreError::conflict(format!(
            "User already exist with this email: {} (Try different email)",
            input.email
        )));
    }

    let now = now_utc();
    conn.execute(
        "INSERT INTO users (first_name, last_name, user_name, email, password_hash, image, \
         is_admin, is_banned, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?7)",
        params![
            input.first_name.as_str(),
            input.last_name.as_str(),
            input.user_name.as_str(),
            input.email.as_str(),
            input.password_hash,
            input.image.as_deref().unwrap_or(DEFAULT_USER_IMAGE),
            now,
        ],
    )?;
    get_user_by_user_name(conn, input.user_name.as_str())
}

pub fn delete_user_by_user_name(conn: &Connection, user_name: &str) -> Result<User, StoreError> {
    let user = get_user_by_user_name(conn, user_name)?;
    conn.execute("DELETE FROM users WHERE id = ?1", params![user.id])
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::conflict("User is referenced by existing orders")
            } else {
                e.into()
            }
        })?;
    Ok(user)
}

pub fn toggle_ban_by_user_name(conn: &Connection, user_name: &str) -> Result<User, StoreError> {
    let (id, is_banned): (i64, bool) = match conn.query_row(
        "SELECT id, is_banned FROM users WHERE user_name = ?1",
        params![user_name],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(StoreError::not_found(format!(
                "User not found with this user name {user_name}"
            )));
        }
        Err(e) => return Err(e.into()),
    };
    conn.execute(
        "UPDATE users SET is_banned = ?1, updated_at = ?2 WHERE id = ?3",
        params![!is_banned, now_utc(), id],
    )?;
    find_user_by_id(conn, id)
}

pub fn toggle_role_by_user_name(conn: &Connection, user_name: &str) -> Result<User, StoreError> {
    let (id, is_admin): (i64, bool) = match conn.query_row(
        "SELECT id, is_admin FROM users WHERE user_name = ?1",
        params![user_name],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(StoreError::not_found(format!(
                "User not found with this user name {user_name}"
            )));
        }
        Err(e) => return Err(e.into()),
    };
    conn.execute(
        "UPDATE users SET is_admin = ?1, updated_at = ?2 WHERE id = ?3",
        params![!is_admin, now_utc(), id],
    )?;
    find_user_by_id(conn, id)
}

pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    changes: &ProfileChanges,
) -> Result<User, StoreError> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    if found == 0 {
        return Err(StoreError::not_found(format!(
            "User not found with this ID: {user_id}"
        )));
    }

    let mut set_parts: Vec<String> = Vec::new();
    let mut sql_params: Vec<Value> = Vec::new();
    if let Some(first_name) = &changes.first_name {
        set_parts.push("first_name = ?".to_string());
        sql_params.push(Value::Text(first_name.as_str().to_string()));
    }
    if let Some(last_name) = &changes.last_name {
        set_parts.push("last_name = ?".to_string());
        sql_params.push(Value::Text(last_name.as_str().to_string()));
    }
    if let Some(image) = &changes.image {
        set_parts.push("image = ?".to_string());
        sql_params.push(Value::Text(image.clone()));
    }
    set_parts.push("updated_at = ?".to_string());
    sql_params.push(Value::Text(now_utc()));
    sql_params.push(Value::Integer(user_id));

    let sql = format!("UPDATE users SET {} WHERE id = ?", set_parts.join(", "));
    conn.execute(&sql, params_from_iter(sql_params.iter()))?;
    find_user_by_id(conn, user_id)
}

use crate::StoreError;
use rusqlite::Connection;

/// Page arithmetic resolved against a table's total row count.
///
/// The count is taken over the whole table, not the filtered set: listings
/// report `totalPages` for the collection while filters only narrow the rows
/// on the page. A requested page past the end clamps to the last page, and
/// the offset never goes negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    pub page: i64,
    pub total_pages: i64,
    pub offset: i64,
}

pub(crate) fn table_count(conn: &Connection, table: &str) -> Result<i64, StoreError> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

pub(crate) fn page_window(count: i64, page: i64, limit: i64) -> PageWindow {
    let limit = limit.max(1);
    let total_pages = (count + limit - 1) / limit;
    let page = if page > total_pages { total_pages } else { page };
    let mut offset = (page - 1) * limit;
    if offset < 0 {
        offset = 0;
    }
    PageWindow {
        page,
        total_pages,
        offset,
    }
}

//! SQL for each entity. Free functions take a `&Connection` so they can run
//! either on their own or inside `Database::transaction`; the `Database`
//! methods next to them are the single-statement conveniences.

pub mod campaigns;
pub mod conversations;
pub mod deals;
pub mod reviews;

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{OptionalExt, WriteOutcome};

/// Explain why a versioned UPDATE touched no rows.
fn resolve_miss<T>(conn: &Connection, table: &str, id: &str) -> Result<WriteOutcome<T>> {
    let sql = format!("SELECT version FROM {table} WHERE id = ?1");
    let current: Option<i64> = conn.query_row(&sql, [id], |row| row.get(0)).optional()?;
    Ok(match current {
        Some(current) => WriteOutcome::Stale { current },
        None => WriteOutcome::Missing,
    })
}

use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use dealroom_types::models::Review;

use crate::Database;
use crate::models::{OptionalExt, col_ts, col_uuid, ts};

const REVIEW_COLUMNS: &str = "id, deal_id, reviewer_id, reviewee_id, rating, comment, created_at";

impl Database {
    pub fn list_reviews_for_deal(&self, deal_id: Uuid) -> Result<Vec<Review>> {
        self.with_conn(|conn| list_reviews_for_deal(conn, deal_id))
    }
}

pub fn insert_review(conn: &Connection, review: &Review) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            review.id.to_string(),
            review.deal_id.to_string(),
            review.reviewer_id.to_string(),
            review.reviewee_id.to_string(),
            review.rating,
            review.comment,
            ts(&review.created_at),
        ],
    )?;
    Ok(())
}

pub fn find_review(conn: &Connection, deal_id: Uuid, reviewer_id: Uuid) -> Result<Option<Review>> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE deal_id = ?1 AND reviewer_id = ?2"),
        [deal_id.to_string(), reviewer_id.to_string()],
        review_from_row,
    )
    .optional()
}

pub fn list_reviews_for_deal(conn: &Connection, deal_id: Uuid) -> Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE deal_id = ?1 ORDER BY created_at"
    ))?;

    let rows = stmt
        .query_map([deal_id.to_string()], review_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: col_uuid(row, 0)?,
        deal_id: col_uuid(row, 1)?,
        reviewer_id: col_uuid(row, 2)?,
        reviewee_id: col_uuid(row, 3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: col_ts(row, 6)?,
    })
}

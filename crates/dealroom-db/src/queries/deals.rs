use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use dealroom_types::models::{Deal, DealStatus, Deliverable};

use super::resolve_miss;
use crate::Database;
use crate::models::{
    OptionalExt, WriteOutcome, col_enum, col_opt_ts, col_opt_uuid, col_ts, col_uuid,
    conversion_error, opt_id, opt_ts, ts,
};

const DEAL_COLUMNS: &str = "id, creator_id, brand_id, campaign_id, conversation_id, title, \
     description, platform, content_type, amount, platform_fee, status, deadline, delivery_days, \
     max_revisions, revision_count, version, created_at, updated_at, accepted_at, funded_at, \
     delivered_at, completed_at, cancelled_at, disputed_at, deliverables";

impl Database {
    pub fn get_deal(&self, id: Uuid) -> Result<Option<Deal>> {
        self.with_conn(|conn| get_deal(conn, id))
    }

    pub fn list_deals_for_user(
        &self,
        user_id: Uuid,
        status: Option<DealStatus>,
    ) -> Result<Vec<Deal>> {
        self.with_conn(|conn| list_deals_for_user(conn, user_id, status))
    }
}

pub fn insert_deal(conn: &Connection, deal: &Deal) -> Result<()> {
    let deliverables = serde_json::to_string(&deal.deliverables)?;
    conn.execute(
        &format!(
            "INSERT INTO deals ({DEAL_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
              ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"
        ),
        params![
            deal.id.to_string(),
            deal.creator_id.to_string(),
            deal.brand_id.to_string(),
            opt_id(&deal.campaign_id),
            opt_id(&deal.conversation_id),
            deal.title,
            deal.description,
            deal.platform.as_str(),
            deal.content_type,
            deal.amount,
            deal.platform_fee,
            deal.status.as_str(),
            opt_ts(&deal.deadline),
            deal.delivery_days,
            deal.max_revisions,
            deal.revision_count,
            deal.version,
            ts(&deal.created_at),
            ts(&deal.updated_at),
            opt_ts(&deal.accepted_at),
            opt_ts(&deal.funded_at),
            opt_ts(&deal.delivered_at),
            opt_ts(&deal.completed_at),
            opt_ts(&deal.cancelled_at),
            opt_ts(&deal.disputed_at),
            deliverables,
        ],
    )?;
    Ok(())
}

pub fn get_deal(conn: &Connection, id: Uuid) -> Result<Option<Deal>> {
    conn.query_row(
        &format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1"),
        [id.to_string()],
        deal_from_row,
    )
    .optional()
}

pub fn list_deals_for_user(
    conn: &Connection,
    user_id: Uuid,
    status: Option<DealStatus>,
) -> Result<Vec<Deal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals
         WHERE (creator_id = ?1 OR brand_id = ?1)
           AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC"
    ))?;

    let rows = stmt
        .query_map(
            params![user_id.to_string(), status.map(|s| s.as_str())],
            deal_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn list_deals_for_campaign(conn: &Connection, campaign_id: Uuid) -> Result<Vec<Deal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DEAL_COLUMNS} FROM deals WHERE campaign_id = ?1 ORDER BY created_at"
    ))?;

    let rows = stmt
        .query_map([campaign_id.to_string()], deal_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Persist `deal` if the stored row is still at `expected_version`.
///
/// Identity columns are never rewritten. On success the returned deal
/// carries the bumped version.
pub fn update_deal(
    conn: &Connection,
    deal: &Deal,
    expected_version: i64,
) -> Result<WriteOutcome<Deal>> {
    let next_version = expected_version + 1;
    let deliverables = serde_json::to_string(&deal.deliverables)?;
    let changed = conn.execute(
        "UPDATE deals SET
            campaign_id = ?1, title = ?2, description = ?3, content_type = ?4,
            amount = ?5, platform_fee = ?6, status = ?7, deadline = ?8,
            revision_count = ?9, updated_at = ?10, accepted_at = ?11, funded_at = ?12,
            delivered_at = ?13, completed_at = ?14, cancelled_at = ?15, disputed_at = ?16,
            deliverables = ?17, version = ?18
         WHERE id = ?19 AND version = ?20",
        params![
            opt_id(&deal.campaign_id),
            deal.title,
            deal.description,
            deal.content_type,
            deal.amount,
            deal.platform_fee,
            deal.status.as_str(),
            opt_ts(&deal.deadline),
            deal.revision_count,
            ts(&deal.updated_at),
            opt_ts(&deal.accepted_at),
            opt_ts(&deal.funded_at),
            opt_ts(&deal.delivered_at),
            opt_ts(&deal.completed_at),
            opt_ts(&deal.cancelled_at),
            opt_ts(&deal.disputed_at),
            deliverables,
            next_version,
            deal.id.to_string(),
            expected_version,
        ],
    )?;

    if changed == 0 {
        return resolve_miss(conn, "deals", &deal.id.to_string());
    }

    let mut stored = deal.clone();
    stored.version = next_version;
    Ok(WriteOutcome::Applied(stored))
}

fn deal_from_row(row: &Row<'_>) -> rusqlite::Result<Deal> {
    let raw_deliverables: String = row.get(25)?;
    let deliverables: Vec<Deliverable> =
        serde_json::from_str(&raw_deliverables).map_err(|e| conversion_error(25, e))?;

    Ok(Deal {
        id: col_uuid(row, 0)?,
        creator_id: col_uuid(row, 1)?,
        brand_id: col_uuid(row, 2)?,
        campaign_id: col_opt_uuid(row, 3)?,
        conversation_id: col_opt_uuid(row, 4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        platform: col_enum(row, 7)?,
        content_type: row.get(8)?,
        deliverables,
        amount: row.get(9)?,
        platform_fee: row.get(10)?,
        status: col_enum(row, 11)?,
        deadline: col_opt_ts(row, 12)?,
        delivery_days: row.get(13)?,
        max_revisions: row.get(14)?,
        revision_count: row.get(15)?,
        version: row.get(16)?,
        created_at: col_ts(row, 17)?,
        updated_at: col_ts(row, 18)?,
        accepted_at: col_opt_ts(row, 19)?,
        funded_at: col_opt_ts(row, 20)?,
        delivered_at: col_opt_ts(row, 21)?,
        completed_at: col_opt_ts(row, 22)?,
        cancelled_at: col_opt_ts(row, 23)?,
        disputed_at: col_opt_ts(row, 24)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_deal;

    #[test]
    fn insert_and_fetch_deal() {
        let db = Database::open_in_memory().unwrap();
        let mut deal = sample_deal();
        deal.deliverables = vec![Deliverable {
            id: Uuid::new_v4(),
            description: "Raw footage".into(),
            is_completed: false,
            completed_at: None,
        }];
        db.with_conn_mut(|conn| insert_deal(conn, &deal)).unwrap();

        let stored = db.get_deal(deal.id).unwrap().unwrap();
        assert_eq!(stored, deal);
        assert!(db.get_deal(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn versioned_update_detects_stale_and_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        let deal = sample_deal();
        db.with_conn_mut(|conn| insert_deal(conn, &deal)).unwrap();

        let mut accepted = deal.clone();
        accepted.status = DealStatus::Accepted;

        let outcome = db.with_conn_mut(|conn| update_deal(conn, &accepted, 1)).unwrap();
        match outcome {
            WriteOutcome::Applied(d) => assert_eq!(d.version, 2),
            other => panic!("expected applied, got {:?}", other),
        }

        let outcome = db.with_conn_mut(|conn| update_deal(conn, &accepted, 1)).unwrap();
        assert_eq!(outcome, WriteOutcome::Stale { current: 2 });

        let mut ghost = accepted.clone();
        ghost.id = Uuid::new_v4();
        let outcome = db.with_conn_mut(|conn| update_deal(conn, &ghost, 1)).unwrap();
        assert_eq!(outcome, WriteOutcome::Missing);
    }

    #[test]
    fn lists_deals_by_participant_and_status() {
        let db = Database::open_in_memory().unwrap();
        let first = sample_deal();
        let mut second = sample_deal();
        second.creator_id = first.creator_id;
        second.status = DealStatus::Accepted;
        db.with_conn_mut(|conn| {
            insert_deal(conn, &first)?;
            insert_deal(conn, &second)
        })
        .unwrap();

        assert_eq!(db.list_deals_for_user(first.creator_id, None).unwrap().len(), 2);
        let accepted = db
            .list_deals_for_user(first.creator_id, Some(DealStatus::Accepted))
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, second.id);
        assert_eq!(db.list_deals_for_user(first.brand_id, None).unwrap().len(), 1);
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use dealroom_types::models::{Campaign, CampaignInfluencer, CampaignStatus, CreatorSnapshot};

use super::resolve_miss;
use crate::Database;
use crate::models::{
    OptionalExt, WriteOutcome, col_enum, col_opt_ts, col_opt_uuid, col_ts, col_uuid, opt_id,
    opt_ts, ts,
};

const CAMPAIGN_COLUMNS: &str = "id, owner_id, name, description, budget, status, start_date, \
     end_date, goal_reach, goal_engagement, version, created_at, updated_at";

const INFLUENCER_COLUMNS: &str = "id, campaign_id, creator_id, snapshot_username, \
     snapshot_display_name, snapshot_followers, snapshot_engagement, status, offered_price, \
     agreed_price, notes, contact_date, agreement_date, post_date, post_url, payment_status, \
     deal_id, version, created_at, updated_at";

impl Database {
    pub fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        self.with_conn(|conn| get_campaign(conn, id))
    }

    pub fn list_campaigns_for_owner(&self, owner_id: Uuid) -> Result<Vec<Campaign>> {
        self.with_conn(|conn| list_campaigns_for_owner(conn, owner_id))
    }

    pub fn list_influencers(&self, campaign_id: Uuid) -> Result<Vec<CampaignInfluencer>> {
        self.with_conn(|conn| list_influencers(conn, campaign_id))
    }
}

// -- Campaigns --

pub fn insert_campaign(conn: &Connection, campaign: &Campaign) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO campaigns ({CAMPAIGN_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            campaign.id.to_string(),
            campaign.owner_id.to_string(),
            campaign.name,
            campaign.description,
            campaign.budget,
            campaign.status.as_str(),
            opt_ts(&campaign.start_date),
            opt_ts(&campaign.end_date),
            campaign.goal_reach,
            campaign.goal_engagement,
            campaign.version,
            ts(&campaign.created_at),
            ts(&campaign.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_campaign(conn: &Connection, id: Uuid) -> Result<Option<Campaign>> {
    conn.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
        [id.to_string()],
        campaign_from_row,
    )
    .optional()
}

pub fn list_campaigns_for_owner(conn: &Connection, owner_id: Uuid) -> Result<Vec<Campaign>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE owner_id = ?1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt
        .query_map([owner_id.to_string()], campaign_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn update_campaign_status(
    conn: &Connection,
    id: Uuid,
    status: CampaignStatus,
    expected_version: i64,
    now: DateTime<Utc>,
) -> Result<WriteOutcome<Campaign>> {
    let changed = conn.execute(
        "UPDATE campaigns SET status = ?1, updated_at = ?2, version = version + 1
         WHERE id = ?3 AND version = ?4",
        params![status.as_str(), ts(&now), id.to_string(), expected_version],
    )?;

    if changed == 0 {
        return resolve_miss(conn, "campaigns", &id.to_string());
    }

    Ok(match get_campaign(conn, id)? {
        Some(campaign) => WriteOutcome::Applied(campaign),
        None => WriteOutcome::Missing,
    })
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: col_uuid(row, 0)?,
        owner_id: col_uuid(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        budget: row.get(4)?,
        status: col_enum(row, 5)?,
        start_date: col_opt_ts(row, 6)?,
        end_date: col_opt_ts(row, 7)?,
        goal_reach: row.get(8)?,
        goal_engagement: row.get(9)?,
        version: row.get(10)?,
        created_at: col_ts(row, 11)?,
        updated_at: col_ts(row, 12)?,
    })
}

// -- Campaign influencers --

pub fn insert_influencer(conn: &Connection, link: &CampaignInfluencer) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO campaign_influencers ({INFLUENCER_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, \
              ?19, ?20)"
        ),
        params![
            link.id.to_string(),
            link.campaign_id.to_string(),
            link.creator_id.to_string(),
            link.snapshot.username,
            link.snapshot.display_name,
            link.snapshot.total_followers,
            link.snapshot.engagement_rate,
            link.status.as_str(),
            link.offered_price,
            link.agreed_price,
            link.notes,
            opt_ts(&link.contact_date),
            opt_ts(&link.agreement_date),
            opt_ts(&link.post_date),
            link.post_url,
            link.payment_status.as_str(),
            opt_id(&link.deal_id),
            link.version,
            ts(&link.created_at),
            ts(&link.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_influencer(conn: &Connection, id: Uuid) -> Result<Option<CampaignInfluencer>> {
    conn.query_row(
        &format!("SELECT {INFLUENCER_COLUMNS} FROM campaign_influencers WHERE id = ?1"),
        [id.to_string()],
        influencer_from_row,
    )
    .optional()
}

pub fn find_influencer(
    conn: &Connection,
    campaign_id: Uuid,
    creator_id: Uuid,
) -> Result<Option<CampaignInfluencer>> {
    conn.query_row(
        &format!(
            "SELECT {INFLUENCER_COLUMNS} FROM campaign_influencers
             WHERE campaign_id = ?1 AND creator_id = ?2"
        ),
        [campaign_id.to_string(), creator_id.to_string()],
        influencer_from_row,
    )
    .optional()
}

pub fn list_influencers(conn: &Connection, campaign_id: Uuid) -> Result<Vec<CampaignInfluencer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INFLUENCER_COLUMNS} FROM campaign_influencers
         WHERE campaign_id = ?1
         ORDER BY created_at, id"
    ))?;

    let rows = stmt
        .query_map([campaign_id.to_string()], influencer_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Persist the mutable fields of `link` if it is still at `expected_version`.
pub fn update_influencer(
    conn: &Connection,
    link: &CampaignInfluencer,
    expected_version: i64,
) -> Result<WriteOutcome<CampaignInfluencer>> {
    let next_version = expected_version + 1;
    let changed = conn.execute(
        "UPDATE campaign_influencers SET
            snapshot_username = ?1, snapshot_display_name = ?2, snapshot_followers = ?3,
            snapshot_engagement = ?4, status = ?5, offered_price = ?6, agreed_price = ?7,
            notes = ?8, contact_date = ?9, agreement_date = ?10, post_date = ?11,
            post_url = ?12, payment_status = ?13, deal_id = ?14, updated_at = ?15,
            version = ?16
         WHERE id = ?17 AND version = ?18",
        params![
            link.snapshot.username,
            link.snapshot.display_name,
            link.snapshot.total_followers,
            link.snapshot.engagement_rate,
            link.status.as_str(),
            link.offered_price,
            link.agreed_price,
            link.notes,
            opt_ts(&link.contact_date),
            opt_ts(&link.agreement_date),
            opt_ts(&link.post_date),
            link.post_url,
            link.payment_status.as_str(),
            opt_id(&link.deal_id),
            ts(&link.updated_at),
            next_version,
            link.id.to_string(),
            expected_version,
        ],
    )?;

    if changed == 0 {
        return resolve_miss(conn, "campaign_influencers", &link.id.to_string());
    }

    let mut stored = link.clone();
    stored.version = next_version;
    Ok(WriteOutcome::Applied(stored))
}

pub fn delete_influencer(
    conn: &Connection,
    id: Uuid,
    expected_version: i64,
) -> Result<WriteOutcome<()>> {
    let changed = conn.execute(
        "DELETE FROM campaign_influencers WHERE id = ?1 AND version = ?2",
        params![id.to_string(), expected_version],
    )?;

    if changed == 0 {
        return resolve_miss(conn, "campaign_influencers", &id.to_string());
    }
    Ok(WriteOutcome::Applied(()))
}

fn influencer_from_row(row: &Row<'_>) -> rusqlite::Result<CampaignInfluencer> {
    Ok(CampaignInfluencer {
        id: col_uuid(row, 0)?,
        campaign_id: col_uuid(row, 1)?,
        creator_id: col_uuid(row, 2)?,
        snapshot: CreatorSnapshot {
            username: row.get(3)?,
            display_name: row.get(4)?,
            total_followers: row.get(5)?,
            engagement_rate: row.get(6)?,
        },
        status: col_enum(row, 7)?,
        offered_price: row.get(8)?,
        agreed_price: row.get(9)?,
        notes: row.get(10)?,
        contact_date: col_opt_ts(row, 11)?,
        agreement_date: col_opt_ts(row, 12)?,
        post_date: col_opt_ts(row, 13)?,
        post_url: row.get(14)?,
        payment_status: col_enum(row, 15)?,
        deal_id: col_opt_uuid(row, 16)?,
        version: row.get(17)?,
        created_at: col_ts(row, 18)?,
        updated_at: col_ts(row, 19)?,
    })
}

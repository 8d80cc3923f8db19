use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE campaigns (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL,
                name            TEXT NOT NULL,
                description     TEXT,
                budget          INTEGER CHECK (budget IS NULL OR budget >= 0),
                status          TEXT NOT NULL DEFAULT 'draft',
                start_date      TEXT,
                end_date        TEXT,
                goal_reach      INTEGER,
                goal_engagement REAL,
                version         INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_campaigns_owner ON campaigns(owner_id, created_at);

            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                creator_id  TEXT NOT NULL,
                brand_id    TEXT NOT NULL,
                deal_id     TEXT,
                created_at  TEXT NOT NULL,
                UNIQUE(creator_id, brand_id)
            );

            CREATE INDEX idx_conversations_brand ON conversations(brand_id);

            CREATE TABLE deals (
                id              TEXT PRIMARY KEY,
                creator_id      TEXT NOT NULL,
                brand_id        TEXT NOT NULL,
                campaign_id     TEXT REFERENCES campaigns(id),
                conversation_id TEXT REFERENCES conversations(id),
                title           TEXT NOT NULL,
                description     TEXT,
                platform        TEXT NOT NULL,
                content_type    TEXT,
                amount          INTEGER NOT NULL CHECK (amount >= 0),
                platform_fee    INTEGER NOT NULL
                                CHECK (platform_fee >= 0 AND platform_fee <= amount),
                status          TEXT NOT NULL DEFAULT 'pending',
                deadline        TEXT,
                delivery_days   INTEGER NOT NULL,
                max_revisions   INTEGER NOT NULL,
                revision_count  INTEGER NOT NULL DEFAULT 0,
                version         INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                accepted_at     TEXT,
                funded_at       TEXT,
                delivered_at    TEXT,
                completed_at    TEXT,
                cancelled_at    TEXT,
                disputed_at     TEXT
            );

            CREATE INDEX idx_deals_creator ON deals(creator_id, created_at);
            CREATE INDEX idx_deals_brand ON deals(brand_id, created_at);
            CREATE INDEX idx_deals_campaign ON deals(campaign_id);

            CREATE TABLE campaign_influencers (
                id                    TEXT PRIMARY KEY,
                campaign_id           TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                creator_id            TEXT NOT NULL,
                snapshot_username     TEXT NOT NULL,
                snapshot_display_name TEXT,
                snapshot_followers    INTEGER NOT NULL DEFAULT 0,
                snapshot_engagement   REAL NOT NULL DEFAULT 0,
                status                TEXT NOT NULL DEFAULT 'shortlisted',
                offered_price         INTEGER,
                agreed_price          INTEGER,
                notes                 TEXT,
                contact_date          TEXT,
                agreement_date        TEXT,
                post_date             TEXT,
                post_url              TEXT,
                payment_status        TEXT NOT NULL DEFAULT 'pending',
                deal_id               TEXT REFERENCES deals(id),
                version               INTEGER NOT NULL DEFAULT 1,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL,
                UNIQUE(campaign_id, creator_id)
            );

            CREATE UNIQUE INDEX idx_campaign_influencers_deal
                ON campaign_influencers(deal_id) WHERE deal_id IS NOT NULL;

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id       TEXT NOT NULL,
                content         TEXT NOT NULL,
                attachments     TEXT NOT NULL DEFAULT '[]',
                is_read         INTEGER NOT NULL DEFAULT 0,
                is_system       INTEGER NOT NULL DEFAULT 0,
                seq             INTEGER NOT NULL,
                created_at      TEXT NOT NULL,
                UNIQUE(conversation_id, seq)
            );

            CREATE INDEX idx_messages_order
                ON messages(conversation_id, created_at, seq);

            CREATE TABLE reviews (
                id          TEXT PRIMARY KEY,
                deal_id     TEXT NOT NULL REFERENCES deals(id),
                reviewer_id TEXT NOT NULL,
                reviewee_id TEXT NOT NULL,
                rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(deal_id, reviewer_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (deal deliverables)");
        conn.execute_batch(
            "
            BEGIN;
            ALTER TABLE deals ADD COLUMN deliverables TEXT NOT NULL DEFAULT '[]';
            INSERT INTO schema_version (version) VALUES (2);
            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

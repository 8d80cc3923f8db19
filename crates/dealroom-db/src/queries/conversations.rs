use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use dealroom_types::models::{
    Attachment, Conversation, ConversationSummary, Message, MessageCursor,
};

use crate::Database;
use crate::models::{
    OptionalExt, col_opt_ts, col_opt_uuid, col_ts, col_uuid, conversion_error, ts,
};

const CONVERSATION_COLUMNS: &str = "id, creator_id, brand_id, deal_id, created_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, attachments, is_read, is_system, seq, created_at";

/// Characters of the newest message shown in the inbox.
const PREVIEW_CHARS: i64 = 100;

impl Database {
    pub fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.with_conn(|conn| get_conversation(conn, id))
    }

    pub fn list_conversation_summaries(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        self.with_conn(|conn| list_conversation_summaries(conn, user_id))
    }

    pub fn list_messages(
        &self,
        conversation_id: Uuid,
        after: Option<MessageCursor>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| list_messages(conn, conversation_id, after, limit))
    }
}

// -- Conversations --

/// Insert `candidate` unless the (creator, brand) pair already has a thread.
/// Returns the stored conversation and whether it was created by this call.
pub fn insert_conversation_if_absent(
    conn: &Connection,
    candidate: &Conversation,
) -> Result<(Conversation, bool)> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO conversations (id, creator_id, brand_id, deal_id, created_at)
         VALUES (?1, ?2, ?3, NULL, ?4)",
        params![
            candidate.id.to_string(),
            candidate.creator_id.to_string(),
            candidate.brand_id.to_string(),
            ts(&candidate.created_at),
        ],
    )?;

    let stored = find_conversation_by_pair(conn, candidate.creator_id, candidate.brand_id)?
        .ok_or_else(|| anyhow::anyhow!("conversation vanished after insert"))?;
    Ok((stored, inserted == 1))
}

pub fn find_conversation_by_pair(
    conn: &Connection,
    creator_id: Uuid,
    brand_id: Uuid,
) -> Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE creator_id = ?1 AND brand_id = ?2"
        ),
        [creator_id.to_string(), brand_id.to_string()],
        conversation_from_row,
    )
    .optional()
}

pub fn get_conversation(conn: &Connection, id: Uuid) -> Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        [id.to_string()],
        conversation_from_row,
    )
    .optional()
}

/// Point the conversation at `deal_id`, but only if it still points at
/// `expected`. Returns false when another deal was bound in the meantime.
pub fn bind_conversation_deal(
    conn: &Connection,
    id: Uuid,
    expected: Option<Uuid>,
    deal_id: Uuid,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE conversations SET deal_id = ?1 WHERE id = ?2 AND deal_id IS ?3",
        params![
            deal_id.to_string(),
            id.to_string(),
            expected.map(|d| d.to_string()),
        ],
    )?;
    Ok(changed == 1)
}

pub fn list_conversation_summaries(
    conn: &Connection,
    user_id: Uuid,
) -> Result<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM (
            SELECT c.id, c.creator_id, c.brand_id, c.deal_id, c.created_at,
                (SELECT m.created_at FROM messages m WHERE m.conversation_id = c.id
                    ORDER BY m.created_at DESC, m.seq DESC LIMIT 1) AS last_message_at,
                (SELECT substr(m.content, 1, ?2) FROM messages m WHERE m.conversation_id = c.id
                    ORDER BY m.created_at DESC, m.seq DESC LIMIT 1) AS last_message_preview,
                (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id
                    AND m.is_read = 0 AND m.sender_id != ?1) AS unread_count
            FROM conversations c
            WHERE c.creator_id = ?1 OR c.brand_id = ?1
         )
         ORDER BY COALESCE(last_message_at, created_at) DESC",
    )?;

    let rows = stmt
        .query_map(params![user_id.to_string(), PREVIEW_CHARS], |row| {
            Ok(ConversationSummary {
                conversation: conversation_from_row(row)?,
                last_message_at: col_opt_ts(row, 5)?,
                last_message_preview: row.get(6)?,
                unread_count: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: col_uuid(row, 0)?,
        creator_id: col_uuid(row, 1)?,
        brand_id: col_uuid(row, 2)?,
        deal_id: col_opt_uuid(row, 3)?,
        created_at: col_ts(row, 4)?,
    })
}

// -- Messages --

/// Position of the newest message, which is also the highest `seq`.
pub fn last_message_position(
    conn: &Connection,
    conversation_id: Uuid,
) -> Result<Option<MessageCursor>> {
    conn.query_row(
        "SELECT created_at, seq FROM messages WHERE conversation_id = ?1
         ORDER BY seq DESC LIMIT 1",
        [conversation_id.to_string()],
        |row| {
            Ok(MessageCursor {
                created_at: col_ts(row, 0)?,
                seq: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    let attachments = serde_json::to_string(&message.attachments)?;
    conn.execute(
        &format!(
            "INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.sender_id.to_string(),
            message.content,
            attachments,
            message.is_read,
            message.is_system,
            message.seq,
            ts(&message.created_at),
        ],
    )?;
    Ok(())
}

/// Messages strictly after `after` in (created_at, seq) order.
pub fn list_messages(
    conn: &Connection,
    conversation_id: Uuid,
    after: Option<MessageCursor>,
    limit: u32,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE conversation_id = ?1
           AND (?2 IS NULL OR created_at > ?2 OR (created_at = ?2 AND seq > ?3))
         ORDER BY created_at ASC, seq ASC
         LIMIT ?4"
    ))?;

    let rows = stmt
        .query_map(
            params![
                conversation_id.to_string(),
                after.map(|c| ts(&c.created_at)),
                after.map(|c| c.seq).unwrap_or(0),
                limit,
            ],
            message_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Flag every unread message not written by `reader_id`. Returns how many
/// rows changed; a second call returns 0.
pub fn mark_read(conn: &Connection, conversation_id: Uuid, reader_id: Uuid) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE messages SET is_read = 1
         WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
        params![conversation_id.to_string(), reader_id.to_string()],
    )?;
    Ok(changed)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let raw_attachments: String = row.get(4)?;
    let attachments: Vec<Attachment> =
        serde_json::from_str(&raw_attachments).map_err(|e| conversion_error(4, e))?;

    Ok(Message {
        id: col_uuid(row, 0)?,
        conversation_id: col_uuid(row, 1)?,
        sender_id: col_uuid(row, 2)?,
        content: row.get(3)?,
        attachments,
        is_read: row.get(5)?,
        is_system: row.get(6)?,
        seq: row.get(7)?,
        created_at: col_ts(row, 8)?,
    })
}

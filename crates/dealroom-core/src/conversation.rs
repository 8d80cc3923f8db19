//! Negotiation threads between one brand and one creator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use dealroom_db::Database;
use dealroom_db::queries::conversations as q;
use dealroom_types::models::{
    Attachment, Conversation, ConversationSummary, Message, MessageCursor, Role,
};

use crate::{Actor, Clock};
use crate::error::{WorkflowError, WorkflowResult};

pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const DEFAULT_PAGE: u32 = 50;
pub const MAX_PAGE: u32 = 200;

#[derive(Clone)]
pub struct ConversationService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl ConversationService {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Return the pair's thread, creating it on first contact.
    pub fn get_or_create_conversation(
        &self,
        creator_id: Uuid,
        brand_id: Uuid,
    ) -> WorkflowResult<Conversation> {
        if creator_id == brand_id {
            return Err(WorkflowError::invalid(
                "a conversation needs two different participants",
            ));
        }

        let candidate = Conversation {
            id: Uuid::new_v4(),
            creator_id,
            brand_id,
            deal_id: None,
            created_at: self.clock.now(),
        };
        let (conversation, created) = self
            .db
            .transaction(|conn| q::insert_conversation_if_absent(conn, &candidate))?;

        if created {
            debug!("Opened conversation {} ({creator_id} <> {brand_id})", conversation.id);
        }
        Ok(conversation)
    }

    /// Load a conversation `user_id` takes part in.
    pub fn get_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> WorkflowResult<Conversation> {
        let conversation = self
            .db
            .get_conversation(conversation_id)?
            .ok_or(WorkflowError::NotFound {
                entity: "conversation",
                id: conversation_id,
            })?;
        ensure_participant(&conversation, user_id)?;
        Ok(conversation)
    }

    pub fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> WorkflowResult<Message> {
        validate_content(content)?;
        validate_attachments(&attachments)?;

        let now = self.clock.now();
        self.db.transaction(|conn| {
            let conversation = load(conn, conversation_id)?;
            ensure_participant(&conversation, sender_id)?;
            append_in(conn, &conversation, sender_id, content, attachments, false, now)
        })
    }

    /// Mark everything the counterpart wrote as read. Returns how many
    /// messages changed; repeating the call returns 0.
    pub fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> WorkflowResult<usize> {
        self.db.transaction(|conn| {
            let conversation = load(conn, conversation_id)?;
            ensure_participant(&conversation, reader_id)?;
            Ok(q::mark_read(conn, conversation_id, reader_id)?)
        })
    }

    pub fn list_messages(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        after: Option<MessageCursor>,
        limit: Option<u32>,
    ) -> WorkflowResult<Vec<Message>> {
        self.get_for_participant(conversation_id, reader_id)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        Ok(self.db.list_messages(conversation_id, after, limit)?)
    }

    pub fn list_conversations(&self, user_id: Uuid) -> WorkflowResult<Vec<ConversationSummary>> {
        Ok(self.db.list_conversation_summaries(user_id)?)
    }
}

pub(crate) fn load(conn: &Connection, conversation_id: Uuid) -> WorkflowResult<Conversation> {
    q::get_conversation(conn, conversation_id)?.ok_or(WorkflowError::NotFound {
        entity: "conversation",
        id: conversation_id,
    })
}

pub(crate) fn ensure_participant(conversation: &Conversation, user_id: Uuid) -> WorkflowResult<()> {
    if conversation.is_participant(user_id) {
        Ok(())
    } else {
        Err(WorkflowError::forbidden("not a participant in this conversation"))
    }
}

/// Creators sit in the creator slot and brands in the brand slot, never the
/// other way round.
pub(crate) fn ensure_own_side(
    actor: &Actor,
    creator_id: Uuid,
    brand_id: Uuid,
) -> WorkflowResult<()> {
    let allowed = match actor.role {
        Role::Creator => actor.user_id == creator_id,
        Role::Brand => actor.user_id == brand_id,
        Role::System => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(WorkflowError::forbidden(
            "you can only take your own side of a conversation",
        ))
    }
}

pub(crate) fn validate_content(content: &str) -> WorkflowResult<()> {
    if content.trim().is_empty() {
        return Err(WorkflowError::invalid("message content is empty"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(WorkflowError::invalid(format!(
            "message content exceeds {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_attachments(attachments: &[Attachment]) -> WorkflowResult<()> {
    for a in attachments {
        if a.url.trim().is_empty() {
            return Err(WorkflowError::invalid("attachment url is empty"));
        }
        if a.size.is_some_and(|s| s < 0) {
            return Err(WorkflowError::invalid("attachment size cannot be negative"));
        }
    }
    Ok(())
}

/// Append inside an open transaction. The new message sorts after every
/// existing one: its timestamp never goes below the newest stored one and
/// its seq is one past the highest.
pub(crate) fn append_in(
    conn: &Connection,
    conversation: &Conversation,
    sender_id: Uuid,
    content: &str,
    attachments: Vec<Attachment>,
    is_system: bool,
    now: DateTime<Utc>,
) -> WorkflowResult<Message> {
    let (created_at, seq) = match q::last_message_position(conn, conversation.id)? {
        Some(last) => (now.max(last.created_at), last.seq + 1),
        None => (now, 1),
    };

    let message = Message {
        id: Uuid::new_v4(),
        conversation_id: conversation.id,
        sender_id,
        content: content.to_string(),
        attachments,
        is_read: false,
        is_system,
        seq,
        created_at,
    };
    q::insert_message(conn, &message)?;
    Ok(message)
}

pub mod migrations;
pub mod models;
pub mod queries;

#[cfg(test)]
pub(crate) mod test_support;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

const READER_POOL_SIZE: usize = 4;

/// Entity store: one writer connection plus a pool of read-only connections.
///
/// Every write goes through the writer mutex, which is also the
/// serialization point for per-conversation message ordering.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        writer.busy_timeout(std::time::Duration::from_secs(5))?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Private in-memory database. Reads share the writer connection.
    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        if self.readers.is_empty() {
            return self.with_conn_mut(f);
        }
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| anyhow!("Writer lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction on the writer. The transaction
    /// commits only if `f` returns `Ok`; any error rolls everything back.
    ///
    /// `f` must use the connection it is handed. Calling back into `Database`
    /// from inside `f` would deadlock on the writer mutex.
    pub fn transaction<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self
            .writer
            .lock()
            .map_err(|e| E::from(anyhow!("Writer lock poisoned: {}", e)))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| E::from(anyhow::Error::from(e)))?;

        let out = f(&tx)?;

        tx.commit().map_err(|e| E::from(anyhow::Error::from(e)))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WriteOutcome;
    use crate::queries::{conversations, deals};
    use crate::test_support::{fixed_now, sample_conversation, sample_deal};
    use dealroom_types::models::{DealStatus, Message};
    use uuid::Uuid;

    #[test]
    fn file_store_keeps_versions_and_order_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dealroom.db");
        let deal = sample_deal();
        let conv = sample_conversation();

        {
            let db = Database::open(&path).unwrap();
            db.transaction(|conn| -> Result<()> {
                deals::insert_deal(conn, &deal)?;
                conversations::insert_conversation_if_absent(conn, &conv)?;
                for (seq, content) in ["A", "B", "C"].into_iter().enumerate() {
                    conversations::insert_message(
                        conn,
                        &Message {
                            id: Uuid::new_v4(),
                            conversation_id: conv.id,
                            sender_id: conv.creator_id,
                            content: content.into(),
                            attachments: vec![],
                            is_read: false,
                            is_system: false,
                            seq: seq as i64 + 1,
                            created_at: fixed_now(),
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();

            let mut accepted = deal.clone();
            accepted.status = DealStatus::Accepted;
            let outcome = db
                .transaction(|conn| deals::update_deal(conn, &accepted, 1))
                .unwrap();
            assert!(matches!(outcome, WriteOutcome::Applied(_)));

            // every pooled reader sees the committed write
            for _ in 0..READER_POOL_SIZE {
                let seen = db.get_deal(deal.id).unwrap().unwrap();
                assert_eq!(seen.version, 2);
            }
        }

        let reopened = Database::open(&path).unwrap();
        let stored = reopened.get_deal(deal.id).unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.status, DealStatus::Accepted);
        assert_eq!(stored.created_at, deal.created_at);

        let messages = reopened.list_messages(conv.id, None, 10).unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["A", "B", "C"]);
        assert!(messages.iter().all(|m| m.created_at == fixed_now()));

        let last = reopened
            .with_conn(|conn| conversations::last_message_position(conn, conv.id))
            .unwrap()
            .unwrap();
        assert_eq!(last.seq, 3);
    }
}

//! Persistence collaborators for conversations and messages.
//!
//! The realtime layer only talks to these traits. `SqliteStore` is the
//! bundled backend: rusqlite is synchronous, so every call runs under
//! `spawn_blocking` and holds the connection lock for exactly one statement
//! group.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use thiserror::Error;

use crate::db::models::{Conversation, Message, NewMessage};
use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Message-store collaborator.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, message: NewMessage) -> StoreResult<Message>;

    async fn get(&self, message_id: &str) -> StoreResult<Option<Message>>;

    /// All messages of a conversation in creation order.
    async fn list(&self, conversation_id: &str) -> StoreResult<Vec<Message>>;

    /// Bulk read-receipt: marks every unread message in the conversation not
    /// sent by `reader` as read. Returns the number of rows changed.
    async fn mark_read(&self, conversation_id: &str, reader: &str) -> StoreResult<usize>;

    /// Returns false if no message had that id.
    async fn delete(&self, message_id: &str) -> StoreResult<bool>;
}

/// Conversation-store collaborator.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the conversation between the two identities, creating it if
    /// needed. The flag is true when a new row was inserted.
    async fn find_or_create(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> StoreResult<(Conversation, bool)>;

    async fn get(&self, conversation_id: &str) -> StoreResult<Option<Conversation>>;

    async fn list_for(&self, identity: &str) -> StoreResult<Vec<Conversation>>;

    /// Deletes the conversation and its messages. Returns false if absent.
    async fn delete(&self, conversation_id: &str) -> StoreResult<bool>;
}

/// SQLite implementation of both store traits.
#[derive(Clone)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> StoreResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut *conn)
        })
        .await?
    }
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        recipient_id: row.get(3)?,
        text: row.get(4)?,
        is_read: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, recipient_id, text, is_read, created_at";
const CONVERSATION_COLUMNS: &str = "id, sender_id, recipient_id, created_at";

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(&self, message: NewMessage) -> StoreResult<Message> {
        self.with_conn(move |conn| {
            let stored = Message {
                id: uuid::Uuid::now_v7().to_string(),
                conversation_id: message.conversation_id,
                sender_id: message.sender_id,
                recipient_id: message.recipient_id,
                text: message.text,
                is_read: false,
                created_at: Utc::now().to_rfc3339(),
            };
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, recipient_id, text, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                rusqlite::params![
                    stored.id,
                    stored.conversation_id,
                    stored.sender_id,
                    stored.recipient_id,
                    stored.text,
                    stored.created_at,
                ],
            )?;
            Ok(stored)
        })
        .await
    }

    async fn get(&self, message_id: &str) -> StoreResult<Option<Message>> {
        let id = message_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            Ok(conn
                .query_row(&sql, rusqlite::params![id], message_from_row)
                .optional()?)
        })
        .await
    }

    async fn list(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let conversation_id = conversation_id.to_string();
        self.with_conn(move |conn| {
            // uuid v7 ids sort by creation time; created_at alone can tie
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map(rusqlite::params![conversation_id], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
    }

    async fn mark_read(&self, conversation_id: &str, reader: &str) -> StoreResult<usize> {
        let conversation_id = conversation_id.to_string();
        let reader = reader.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                rusqlite::params![conversation_id, reader],
            )?;
            Ok(changed)
        })
        .await
    }

    async fn delete(&self, message_id: &str) -> StoreResult<bool> {
        let id = message_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM messages WHERE id = ?1", rusqlite::params![id])?;
            Ok(removed > 0)
        })
        .await
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn find_or_create(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> StoreResult<(Conversation, bool)> {
        let sender_id = sender_id.to_string();
        let recipient_id = recipient_id.to_string();
        self.with_conn(move |conn| {
            let (low, high) = if sender_id <= recipient_id {
                (sender_id.clone(), recipient_id.clone())
            } else {
                (recipient_id.clone(), sender_id.clone())
            };

            let tx = conn.transaction()?;
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE participant_low = ?1 AND participant_high = ?2"
            );
            let existing = tx
                .query_row(&sql, rusqlite::params![low, high], conversation_from_row)
                .optional()?;
            if let Some(conversation) = existing {
                return Ok((conversation, false));
            }

            let conversation = Conversation {
                id: uuid::Uuid::now_v7().to_string(),
                sender_id,
                recipient_id,
                created_at: Utc::now().to_rfc3339(),
            };
            tx.execute(
                "INSERT INTO conversations (id, sender_id, recipient_id, participant_low, participant_high, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    conversation.id,
                    conversation.sender_id,
                    conversation.recipient_id,
                    low,
                    high,
                    conversation.created_at,
                ],
            )?;
            tx.commit()?;
            Ok((conversation, true))
        })
        .await
    }

    async fn get(&self, conversation_id: &str) -> StoreResult<Option<Conversation>> {
        let id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
            Ok(conn
                .query_row(&sql, rusqlite::params![id], conversation_from_row)
                .optional()?)
        })
        .await
    }

    async fn list_for(&self, identity: &str) -> StoreResult<Vec<Conversation>> {
        let identity = identity.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE sender_id = ?1 OR recipient_id = ?1
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let conversations = stmt
                .query_map(rusqlite::params![identity], conversation_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(conversations)
        })
        .await
    }

    async fn delete(&self, conversation_id: &str) -> StoreResult<bool> {
        let id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                rusqlite::params![id],
            )?;
            let removed = tx.execute(
                "DELETE FROM conversations WHERE id = ?1",
                rusqlite::params![id],
            )?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }
}

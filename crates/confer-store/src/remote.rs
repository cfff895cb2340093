//! The backend-neutral session store contract and its SQLite implementation.
//!
//! `SessionStore` is the single seam between the session manager and
//! persistence: the device-local store implements it for anonymous use and
//! `SqliteSessionStore` implements it for authenticated use. Call sites
//! never branch on which backend is active.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use confer_core::error::{ConferError, Result};
use confer_core::types::{ChatSession, MessageRole, SessionMeta, StoredMessage};

use crate::db::Database;

/// Persistence operations for chat sessions and their messages.
///
/// `owner` scopes listings and creations to one user identity; the local
/// backend is device-scoped and ignores it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All sessions of `owner`, sorted by creation time descending.
    async fn list_sessions(&self, owner: &str) -> Result<Vec<ChatSession>>;

    /// Looks up one session by id, regardless of owner.
    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>>;

    /// Creates a session and returns it with its store-assigned id.
    async fn create_session(
        &self,
        owner: &str,
        title: &str,
        meta: SessionMeta,
    ) -> Result<ChatSession>;

    /// Deletes a session and all of its messages, messages first.
    ///
    /// If the messages cannot be removed the session row stays intact and
    /// the error surfaces. Deleting an id that is not present is not an
    /// error.
    async fn delete_session(&self, id: &str) -> Result<()>;

    /// Updates a session title in place. Unknown ids are an error.
    async fn rename_session(&self, id: &str, new_title: &str) -> Result<()>;

    /// Appends one message to its session's history.
    async fn append_message(&self, message: &StoredMessage) -> Result<()>;

    /// Messages of one session in conversation order.
    async fn messages(&self, session_id: &str) -> Result<Vec<StoredMessage>>;
}

/// SQLite-backed session store, used when a user is authenticated.
pub struct SqliteSessionStore {
    db: Arc<Database>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn list_sessions(&self, owner: &str) -> Result<Vec<ChatSession>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, created_at, card_theme, card_title, theme_id
                     FROM sessions
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, id ASC",
                )
                .map_err(|e| ConferError::Store(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![owner], |row| Ok(row_to_session(row)))
                .map_err(|e| ConferError::Store(e.to_string()))?;

            let mut sessions = Vec::new();
            for row in rows {
                let session = row.map_err(|e| ConferError::Store(e.to_string()))??;
                sessions.push(session);
            }
            Ok(sessions)
        })
    }

    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, created_at, card_theme, card_title, theme_id
                     FROM sessions WHERE id = ?1",
                )
                .map_err(|e| ConferError::Store(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id], |row| Ok(row_to_session(row)))
                .optional()
                .map_err(|e| ConferError::Store(e.to_string()))?;

            match result {
                Some(session) => Ok(Some(session?)),
                None => Ok(None),
            }
        })
    }

    async fn create_session(
        &self,
        owner: &str,
        title: &str,
        meta: SessionMeta,
    ) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
            card_theme: meta.card_theme,
            card_title: meta.card_title,
            theme_id: meta.theme_id,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, title, created_at, card_theme, card_title, theme_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    session.id,
                    owner,
                    session.title,
                    session.created_at.timestamp_millis(),
                    session.card_theme,
                    session.card_title,
                    session.theme_id,
                ],
            )
            .map_err(|e| ConferError::Store(format!("Failed to create session: {}", e)))?;
            Ok(())
        })?;

        Ok(session)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            // One transaction, messages first. A failure before commit
            // leaves both tables untouched.
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| ConferError::Store(e.to_string()))?;

            tx.execute(
                "DELETE FROM messages WHERE session_id = ?1",
                rusqlite::params![id],
            )
            .map_err(|e| ConferError::Store(format!("Failed to delete messages: {}", e)))?;

            tx.execute("DELETE FROM sessions WHERE id = ?1", rusqlite::params![id])
                .map_err(|e| ConferError::Store(format!("Failed to delete session: {}", e)))?;

            tx.commit()
                .map_err(|e| ConferError::Store(e.to_string()))?;
            Ok(())
        })
    }

    async fn rename_session(&self, id: &str, new_title: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET title = ?1 WHERE id = ?2",
                    rusqlite::params![new_title, id],
                )
                .map_err(|e| ConferError::Store(format!("Failed to rename session: {}", e)))?;

            if changed == 0 {
                return Err(ConferError::Store(format!("session not found: {}", id)));
            }
            Ok(())
        })
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id,
                    message.session_id,
                    message.role.as_str(),
                    message.content,
                    message.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| ConferError::Store(format!("Failed to append message: {}", e)))?;
            Ok(())
        })
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, created_at
                     FROM messages
                     WHERE session_id = ?1
                     ORDER BY created_at ASC, id ASC",
                )
                .map_err(|e| ConferError::Store(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id], |row| Ok(row_to_message(row)))
                .map_err(|e| ConferError::Store(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| ConferError::Store(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }
}

// ============================================================================
// Helper functions for row-to-entity conversion.
// ============================================================================

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<ChatSession> {
    let id: String = row.get(0).map_err(|e| ConferError::Store(e.to_string()))?;
    let title: String = row.get(2).map_err(|e| ConferError::Store(e.to_string()))?;
    let created_ms: i64 = row.get(3).map_err(|e| ConferError::Store(e.to_string()))?;
    let card_theme: Option<String> = row.get(4).map_err(|e| ConferError::Store(e.to_string()))?;
    let card_title: Option<String> = row.get(5).map_err(|e| ConferError::Store(e.to_string()))?;
    let theme_id: Option<String> = row.get(6).map_err(|e| ConferError::Store(e.to_string()))?;

    Ok(ChatSession {
        id,
        title,
        created_at: Utc
            .timestamp_millis_opt(created_ms)
            .single()
            .unwrap_or_default(),
        card_theme,
        card_title,
        theme_id,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<StoredMessage> {
    let id: String = row.get(0).map_err(|e| ConferError::Store(e.to_string()))?;
    let session_id: String = row.get(1).map_err(|e| ConferError::Store(e.to_string()))?;
    let role_str: String = row.get(2).map_err(|e| ConferError::Store(e.to_string()))?;
    let content: String = row.get(3).map_err(|e| ConferError::Store(e.to_string()))?;
    let created_ms: i64 = row.get(4).map_err(|e| ConferError::Store(e.to_string()))?;

    let role = MessageRole::parse(&role_str)
        .ok_or_else(|| ConferError::Store(format!("unknown message role: {}", role_str)))?;

    Ok(StoredMessage {
        id,
        session_id,
        role,
        content,
        created_at: Utc
            .timestamp_millis_opt(created_ms)
            .single()
            .unwrap_or_default(),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

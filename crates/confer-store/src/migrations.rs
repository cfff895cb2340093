//! Database schema migrations.
//!
//! Applies the initial schema: the sessions and messages tables plus the
//! schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use confer_core::error::ConferError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), ConferError> {
    // Create the migrations tracking table first.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ConferError::Store(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ConferError::Store(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// The messages foreign key deliberately carries no ON DELETE action: a
/// session row cannot be deleted while its messages still exist, which
/// enforces the messages-before-session deletion order at the schema level.
fn apply_v1(conn: &Connection) -> Result<(), ConferError> {
    conn.execute_batch(
        "
        -- Chat sessions, scoped by owning user.
        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT NOT NULL,
            title       TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            card_theme  TEXT,
            card_title  TEXT,
            theme_id    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions (user_id, created_at DESC);

        -- Messages, each owned by exactly one session.
        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY NOT NULL,
            session_id  TEXT NOT NULL,
            role        TEXT NOT NULL
                        CHECK (role IN ('user', 'assistant')),
            content     TEXT NOT NULL DEFAULT '',
            created_at  INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages (session_id, created_at ASC);

        -- Record migration.
        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| ConferError::Store(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

//! Database schema migrations.
//!
//! Version 1 creates the tables the chat pipeline reads: the conversation
//! log (`chat_messages`), the catalog (`authors`, `books`) and the store
//! policies with their embeddings (`policies`).

use rusqlite::Connection;
use tracing::info;

use bookchat_core::error::BookchatError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), BookchatError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| BookchatError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| BookchatError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), BookchatError> {
    conn.execute_batch(
        r#"
        -- Conversation log. Written by the storefront backend; read here.
        CREATE TABLE IF NOT EXISTS chat_messages (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            "conversationId"    TEXT NOT NULL,
            role                TEXT NOT NULL,
            content             TEXT NOT NULL DEFAULT '',
            created_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation
            ON chat_messages ("conversationId", created_at DESC);

        CREATE TABLE IF NOT EXISTS authors (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            name    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS books (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            author_id   INTEGER REFERENCES authors(id) ON DELETE SET NULL,
            price       REAL NOT NULL DEFAULT 0,
            stock       INTEGER NOT NULL DEFAULT 0,
            description TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_books_title
            ON books (title);

        -- Store policies (returns, shipping, ...). The embedding is a
        -- little-endian f32 blob.
        CREATE TABLE IF NOT EXISTS policies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL DEFAULT '',
            content     TEXT NOT NULL,
            embedding   BLOB
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        "#,
    )
    .map_err(|e| BookchatError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

//! Conversation history adapter over `chat_messages`.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use bookchat_core::error::BookchatError;
use bookchat_core::types::{ConversationTurn, Role};

use crate::db::Database;

/// Reads (and optionally appends) conversation turns.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db: Arc<Database>,
}

impl HistoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The most recent `limit` turns of a conversation, oldest first.
    ///
    /// History is a best-effort dependency: any storage failure is logged
    /// and an empty history returned.
    pub fn get_history(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn> {
        match self.try_get_history(session_id, limit) {
            Ok(turns) => turns,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to load chat history");
                Vec::new()
            }
        }
    }

    /// Fallible form of [`HistoryStore::get_history`].
    pub fn try_get_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, BookchatError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut turns = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"SELECT role, content, "conversationId", created_at
                       FROM chat_messages
                       WHERE "conversationId" = ?1
                       ORDER BY created_at DESC, id DESC
                       LIMIT ?2"#,
                )
                .map_err(|e| BookchatError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id, limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(|e| BookchatError::Storage(e.to_string()))?;

            let mut turns = Vec::new();
            for row in rows {
                let (role, content, conversation_id, created_at) =
                    row.map_err(|e| BookchatError::Storage(e.to_string()))?;
                turns.push(ConversationTurn {
                    role: Role::from_stored(&role),
                    content,
                    conversation_id,
                    created_at: millis_to_datetime(created_at)?,
                });
            }
            Ok(turns)
        })?;

        // Newest-first from the query; callers want chronological order.
        turns.reverse();
        Ok(turns)
    }

    /// Append a turn stamped with the current time.
    pub fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), BookchatError> {
        self.insert_turn(&ConversationTurn {
            role,
            content: content.to_string(),
            conversation_id: session_id.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Insert a fully specified turn.
    pub fn insert_turn(&self, turn: &ConversationTurn) -> Result<(), BookchatError> {
        self.db.with_conn(|conn| {
            conn.execute(
                r#"INSERT INTO chat_messages ("conversationId", role, content, created_at)
                   VALUES (?1, ?2, ?3, ?4)"#,
                rusqlite::params![
                    turn.conversation_id,
                    turn.role.as_str(),
                    turn.content,
                    turn.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| BookchatError::Storage(format!("Failed to save chat message: {}", e)))?;
            Ok(())
        })
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, BookchatError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| BookchatError::Storage(format!("Invalid timestamp: {}", millis)))
}

//! Policy store: nearest-neighbour lookup over embedded policy texts.

use std::sync::Arc;

use rusqlite::OptionalExtension;

use bookchat_core::error::BookchatError;
use bookchat_core::types::PolicyRecord;

use crate::db::Database;
use crate::vector::encode_embedding;

/// The closest policy to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyMatch {
    pub content: String,
    /// `None` when the stored embedding cannot be compared with the query.
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PolicyStore {
    db: Arc<Database>,
}

impl PolicyStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The single policy with the highest cosine similarity to `embedding`.
    pub fn nearest(&self, embedding: &[f32]) -> Result<Option<PolicyMatch>, BookchatError> {
        let blob = encode_embedding(embedding);
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT content, cosine_similarity(embedding, ?1) AS similarity
                 FROM policies
                 ORDER BY similarity DESC
                 LIMIT 1",
                [&blob],
                |row| {
                    Ok(PolicyMatch {
                        content: row.get(0)?,
                        similarity: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| BookchatError::Storage(format!("Policy lookup failed: {}", e)))
        })
    }

    /// Insert a policy and return its row id.
    pub fn insert(&self, record: &PolicyRecord) -> Result<i64, BookchatError> {
        let blob = encode_embedding(&record.embedding);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO policies (title, content, embedding) VALUES (?1, ?2, ?3)",
                rusqlite::params![record.title, record.content, blob],
            )
            .map_err(|e| BookchatError::Storage(format!("Failed to save policy: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn count(&self) -> Result<u64, BookchatError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM policies", [], |row| row.get(0))
                .map_err(|e| BookchatError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

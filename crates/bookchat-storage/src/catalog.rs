//! Catalog access for generated queries: schema text and read-only execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use bookchat_core::error::BookchatError;

use crate::db::Database;

/// Virtual machine steps between deadline checks.
const PROGRESS_STEPS: i32 = 1000;

/// Bounds on a single generated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Wall-clock budget; the statement is interrupted once it is spent.
    pub timeout: Duration,
    /// Rows collected before the rest of the result is dropped.
    pub max_rows: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_rows: 50,
        }
    }
}

/// Column names and values of a query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Set when the row cap cut the result short.
    #[serde(skip)]
    pub truncated: bool,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Render the rows as a compact JSON array of row arrays, the form shown
    /// to the model when phrasing an answer.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.rows).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Schema introspection and query execution over the catalog tables.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
    limits: QueryLimits,
}

impl CatalogStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            limits: QueryLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// `CREATE TABLE` statements for the given tables, in the given order.
    ///
    /// Fails if any table does not exist.
    pub fn table_info(&self, tables: &[String]) -> Result<String, BookchatError> {
        self.db.with_conn(|conn| {
            let mut sections = Vec::with_capacity(tables.len());
            for table in tables {
                let sql: Option<String> = conn
                    .query_row(
                        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        [table],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| BookchatError::Storage(e.to_string()))?;

                match sql {
                    Some(sql) => sections.push(sql),
                    None => {
                        return Err(BookchatError::Storage(format!(
                            "Table not found: {}",
                            table
                        )))
                    }
                }
            }
            Ok(sections.join("\n\n"))
        })
    }

    /// Execute a statement with writes disabled and collect its rows.
    ///
    /// The statement is interrupted once the configured timeout elapses and
    /// at most `max_rows` rows are kept. Blocks the calling thread.
    pub fn run_read_query(&self, sql: &str) -> Result<QueryRows, BookchatError> {
        let QueryLimits { timeout, max_rows } = self.limits;
        self.db.with_read_only(|conn| {
            let deadline = Instant::now() + timeout;
            conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
            let result = collect_rows(conn, sql, max_rows);
            conn.progress_handler(0, None::<fn() -> bool>);

            result.map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.code == ErrorCode::OperationInterrupted =>
                {
                    BookchatError::Storage(format!("Query interrupted after {:?}", timeout))
                }
                e => BookchatError::Storage(format!("Query failed: {}", e)),
            })
        })
    }

    /// Names of user tables, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>, BookchatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                )
                .map_err(|e| BookchatError::Storage(e.to_string()))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| BookchatError::Storage(e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| BookchatError::Storage(e.to_string()))?;
            Ok(names)
        })
    }

    /// Up to `limit` book titles, for connectivity checks.
    pub fn sample_titles(&self, limit: usize) -> Result<Vec<String>, BookchatError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT title FROM books ORDER BY id LIMIT ?1")
                .map_err(|e| BookchatError::Storage(e.to_string()))?;
            let titles = stmt
                .query_map([limit], |row| row.get::<_, String>(0))
                .map_err(|e| BookchatError::Storage(e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| BookchatError::Storage(e.to_string()))?;
            Ok(titles)
        })
    }
}

fn collect_rows(conn: &Connection, sql: &str, max_rows: usize) -> rusqlite::Result<QueryRows> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|c| c.to_string())
        .collect();
    let width = columns.len();

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next()? {
        if out.len() == max_rows {
            truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(value_to_json(row.get_ref(i)?));
        }
        out.push(values);
    }

    Ok(QueryRows {
        columns,
        rows: out,
        truncated,
    })
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Arc<Database>, CatalogStore) {
        let db = Arc::new(Database::in_memory().unwrap());
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO authors (id, name) VALUES (1, 'J.K. Rowling');
                 INSERT INTO books (title, author_id, price, stock)
                 VALUES ('Harry Potter và Hòn đá Phù thủy', 1, 120000, 12);
                 INSERT INTO books (title, author_id, price, stock)
                 VALUES ('Harry Potter và Phòng chứa Bí mật', 1, 135000, 0);",
            )
            .map_err(|e| BookchatError::Storage(e.to_string()))
        })
        .unwrap();
        (Arc::clone(&db), CatalogStore::new(db))
    }

    #[test]
    fn test_table_info_returns_create_statements() {
        let (_, store) = seeded();
        let info = store
            .table_info(&["books".to_string(), "authors".to_string()])
            .unwrap();
        let sections: Vec<&str> = info.split("\n\n").collect();
        assert_eq!(sections.len(), 2);
        assert!(sections[0].starts_with("CREATE TABLE"));
        assert!(sections[0].contains("books"));
        assert!(sections[0].contains("price"));
        assert!(sections[1].contains("authors"));
        assert!(!sections[1].contains("price"));
    }

    #[test]
    fn test_table_info_missing_table() {
        let (_, store) = seeded();
        let err = store.table_info(&["orders".to_string()]).unwrap_err();
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn test_run_read_query_rows() {
        let (_, store) = seeded();
        let rows = store
            .run_read_query(
                "SELECT b.title, b.price, a.name FROM books b JOIN authors a ON a.id = b.author_id
                 WHERE b.title LIKE '%hòn đá%' ",
            )
            .unwrap();
        assert_eq!(rows.columns, vec!["title", "price", "name"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0][1], serde_json::json!(120000.0));
        assert!(rows.render().contains("J.K. Rowling"));
    }

    #[test]
    fn test_like_is_case_insensitive_for_ascii() {
        let (_, store) = seeded();
        let rows = store
            .run_read_query("SELECT title FROM books WHERE title LIKE '%harry potter%'")
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_like_folds_vietnamese_case() {
        let (db, store) = seeded();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO books (title, price, stock) VALUES ('Đắc Nhân Tâm', 86000, 5)",
                [],
            )
            .map_err(|e| BookchatError::Storage(e.to_string()))
        })
        .unwrap();

        let rows = store
            .run_read_query("SELECT title, price FROM books WHERE title LIKE '%đắc nhân tâm%'")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0][0], serde_json::json!("Đắc Nhân Tâm"));
    }

    #[test]
    fn test_run_read_query_interrupted_at_deadline() {
        let (_, store) = seeded();
        let store = store.with_limits(QueryLimits {
            timeout: Duration::from_millis(200),
            max_rows: 50,
        });

        let start = Instant::now();
        let err = store
            .run_read_query(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c)
                 SELECT x FROM c WHERE x < 0",
            )
            .unwrap_err();
        assert!(err.to_string().contains("interrupted"), "{}", err);
        assert!(start.elapsed() < Duration::from_secs(5));

        // The handler is cleared, so the connection keeps working.
        let rows = store.run_read_query("SELECT title FROM books").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_run_read_query_caps_rows() {
        let (_, store) = seeded();
        let store = store.with_limits(QueryLimits {
            timeout: Duration::from_secs(5),
            max_rows: 3,
        });

        let rows = store
            .run_read_query(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c)
                 SELECT x FROM c",
            )
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.truncated);
        assert_eq!(rows.render(), "[[1],[2],[3]]");

        let rows = store.run_read_query("SELECT title FROM books").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows.truncated);
    }

    #[test]
    fn test_run_read_query_empty() {
        let (_, store) = seeded();
        let rows = store
            .run_read_query("SELECT title FROM books WHERE price > 1000000")
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(rows.render(), "[]");
    }

    #[test]
    fn test_run_read_query_rejects_writes() {
        let (db, store) = seeded();
        assert!(store.run_read_query("UPDATE books SET price = 0").is_err());

        let zero_priced: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM books WHERE price = 0", [], |r| {
                    r.get(0)
                })
                .map_err(|e| BookchatError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(zero_priced, 0);
    }

    #[test]
    fn test_run_read_query_invalid_sql() {
        let (_, store) = seeded();
        assert!(store.run_read_query("SELEC title FROM books").is_err());
    }

    #[test]
    fn test_list_tables_and_sample_titles() {
        let (_, store) = seeded();
        let tables = store.list_tables().unwrap();
        for expected in ["authors", "books", "chat_messages", "policies"] {
            assert!(tables.contains(&expected.to_string()), "missing {}", expected);
        }

        let titles = store.sample_titles(1).unwrap();
        assert_eq!(titles, vec!["Harry Potter và Hòn đá Phù thủy".to_string()]);
    }
}

//! Bookchat Storage crate - SQLite persistence for the chat pipeline.
//!
//! Provides a WAL-mode SQLite database with migrations and the three stores
//! the pipeline reads: conversation history, the book catalog (schema text
//! and read-only query execution) and embedded store policies.

pub mod catalog;
pub mod db;
pub mod history;
pub mod migrations;
pub mod policy;
pub mod text;
pub mod vector;

pub use catalog::{CatalogStore, QueryLimits, QueryRows};
pub use db::Database;
pub use history::HistoryStore;
pub use policy::{PolicyMatch, PolicyStore};
pub use text::like_matches;
pub use vector::{cosine_similarity, decode_embedding, encode_embedding};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BookchatError, Result};

/// Top-level configuration for the Bookchat service.
///
/// Loaded from `bookchat.toml` by default. Every section falls back to its
/// defaults, so a partial (or empty) file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookchatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl BookchatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BookchatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BookchatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    ///
    /// Recognized: `DATABASE_URL` (optionally `sqlite://`-prefixed) and
    /// `GOOGLE_API_KEY`.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using an arbitrary lookup function.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database.path = database_path_from_url(&url);
        }
        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.llm.api_key = key;
        }
    }

    /// Check values that would otherwise fail deep inside a request.
    pub fn validate(&self) -> Result<()> {
        if self.chat.history_limit == 0 {
            return Err(BookchatError::Config(
                "chat.history_limit must be at least 1".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.chat.policy_similarity_threshold) {
            return Err(BookchatError::Config(format!(
                "chat.policy_similarity_threshold must be within [-1, 1], got {}",
                self.chat.policy_similarity_threshold
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(BookchatError::Config(
                "llm.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.database.schema_tables.is_empty() {
            return Err(BookchatError::Config(
                "database.schema_tables must name at least one table".to_string(),
            ));
        }
        if self.database.query_timeout_ms == 0 || self.database.max_rows == 0 {
            return Err(BookchatError::Config(
                "database.query_timeout_ms and database.max_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Strip an optional `sqlite://` or `sqlite:` scheme from a database URL.
fn database_path_from_url(url: &str) -> PathBuf {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used when `RUST_LOG` is unset: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Origins allowed by CORS. Empty disables the CORS layer.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_body_bytes: 64 * 1024,
            allowed_origins: vec![],
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Tables whose schema is shown to the model when writing queries.
    pub schema_tables: Vec<String>,
    /// Wall-clock budget for one generated query, in milliseconds.
    pub query_timeout_ms: u64,
    /// Rows of a generated query passed on to the model.
    pub max_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bookchat.db"),
            busy_timeout_ms: 5_000,
            schema_tables: vec!["books".to_string(), "authors".to_string()],
            query_timeout_ms: 5_000,
            max_rows: 50,
        }
    }
}

/// Language model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. Usually supplied through `GOOGLE_API_KEY` instead of the file.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// Base URL of the generative language API.
    pub base_url: String,
    /// Model used for classification, query writing and answers.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on a single model or embedding call, in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.0,
            timeout_secs: 30,
        }
    }
}

/// Embedding service settings. Shares the API key and base URL of [`LlmConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Task type sent with every embedding request.
    pub task_type: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-004".to_string(),
            task_type: "RETRIEVAL_QUERY".to_string(),
        }
    }
}

/// Request pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of most recent turns loaded as context.
    pub history_limit: usize,
    /// Policies must score strictly above this cosine similarity to be returned.
    pub policy_similarity_threshold: f64,
    /// Write the question and answer back to `chat_messages` after responding.
    pub record_turns: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 6,
            policy_similarity_threshold: 0.3,
            record_turns: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = BookchatConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.schema_tables, vec!["books", "authors"]);
        assert_eq!(config.database.query_timeout_ms, 5_000);
        assert_eq!(config.database.max_rows, 50);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.chat.history_limit, 6);
        assert_eq!(config.chat.policy_similarity_threshold, 0.3);
        assert!(!config.chat.record_turns);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[server]
host = "0.0.0.0"
port = 9090

[database]
path = "/var/lib/bookchat/store.db"
schema_tables = ["books"]

[chat]
history_limit = 10
policy_similarity_threshold = 0.5
record_turns = true
"#;
        let file = create_temp_config(content);
        let config = BookchatConfig::load(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/bookchat/store.db")
        );
        assert_eq!(config.database.schema_tables, vec!["books"]);
        assert_eq!(config.chat.history_limit, 10);
        assert_eq!(config.chat.policy_similarity_threshold, 0.5);
        assert!(config.chat.record_turns);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = BookchatConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.chat.history_limit, 6);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[server\nport = ");
        let result = BookchatConfig::load(file.path());
        assert!(matches!(result, Err(BookchatError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = BookchatConfig::load_or_default(Path::new("/nonexistent/bookchat.toml"));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bookchat.toml");

        let mut config = BookchatConfig::default();
        config.chat.history_limit = 3;
        config.save(&path).unwrap();

        let reloaded = BookchatConfig::load(&path).unwrap();
        assert_eq!(reloaded.chat.history_limit, 3);
        assert_eq!(reloaded.llm.model, config.llm.model);
    }

    #[test]
    fn test_api_key_not_written_when_empty() {
        let toml_str = toml::to_string_pretty(&BookchatConfig::default()).unwrap();
        assert!(!toml_str.contains("api_key"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite:///tmp/books.db"),
            ("GOOGLE_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = BookchatConfig::default();
        config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.database.path, PathBuf::from("/tmp/books.db"));
        assert_eq!(config.llm.api_key, "secret");
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut config = BookchatConfig::default();
        config.apply_env_with(|_| Some("  ".to_string()));
        assert_eq!(config.database.path, PathBuf::from("bookchat.db"));
        assert!(config.llm.api_key.is_empty());
    }

    #[test]
    fn test_database_path_from_url_variants() {
        assert_eq!(database_path_from_url("sqlite:data.db"), PathBuf::from("data.db"));
        assert_eq!(database_path_from_url("sqlite://data.db"), PathBuf::from("data.db"));
        assert_eq!(database_path_from_url(" plain.db "), PathBuf::from("plain.db"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BookchatConfig::default();
        config.chat.history_limit = 0;
        assert!(config.validate().is_err());

        let mut config = BookchatConfig::default();
        config.chat.policy_similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = BookchatConfig::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = BookchatConfig::default();
        config.database.schema_tables.clear();
        assert!(config.validate().is_err());

        let mut config = BookchatConfig::default();
        config.database.query_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = BookchatConfig::default();
        config.database.max_rows = 0;
        assert!(config.validate().is_err());
    }
}

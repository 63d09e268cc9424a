//! CLI argument definitions for the Bookchat binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bookchat - intent-routing chat assistant for an online bookstore.
#[derive(Parser, Debug)]
#[command(name = "bookchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(short = 'd', long = "database", global = true)]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve `POST /chat` (default).
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// List database tables and a few book titles.
    CheckDb {
        /// Number of titles to show.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// List models that support text generation for the configured key.
    ListModels,
    /// Embed a policy text and add it to the policy store.
    AddPolicy {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Serve { port: None })
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > BOOKCHAT_CONFIG env var > ./bookchat.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_path_with<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = lookup("BOOKCHAT_CONFIG").filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        PathBuf::from("bookchat.toml")
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > BOOKCHAT_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(config_port, |key| std::env::var(key).ok())
    }

    fn resolve_port_with<F>(&self, config_port: u16, lookup: F) -> u16
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(Command::Serve { port: Some(p) }) = &self.command {
            return *p;
        }
        if let Some(p) = lookup("BOOKCHAT_PORT").and_then(|v| v.parse::<u16>().ok()) {
            return p;
        }
        config_port
    }

    /// Resolve the log level. `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

//! Bookchat application binary - composition root.
//!
//! 1. Load `.env`, configuration and environment overrides
//! 2. Open the SQLite store (migrations run on open)
//! 3. Build the Gemini client used for both completions and embeddings
//! 4. Run the requested command: serve the API or a maintenance task

mod cli;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use bookchat_api::{start_server, AppState};
use bookchat_chat::ChatOrchestrator;
use bookchat_core::config::BookchatConfig;
use bookchat_core::types::PolicyRecord;
use bookchat_llm::{with_timeout, EmbeddingService, GeminiClient};
use bookchat_storage::{CatalogStore, Database, PolicyStore};

use cli::{CliArgs, Command};

/// Task type for embedding stored documents, as opposed to queries.
const DOCUMENT_TASK_TYPE: &str = "RETRIEVAL_DOCUMENT";

fn open_database(config: &BookchatConfig) -> Result<Arc<Database>, Box<dyn Error>> {
    let path = &config.database.path;
    let db = Database::new(
        path,
        Duration::from_millis(config.database.busy_timeout_ms),
    )?;
    info!(path = %path.display(), "SQLite database opened");
    Ok(Arc::new(db))
}

async fn serve(config: BookchatConfig) -> Result<(), Box<dyn Error>> {
    let db = open_database(&config)?;
    let gemini = Arc::new(GeminiClient::new(&config.llm, &config.embedding)?);
    info!(
        model = %config.llm.model,
        embedding_model = %config.embedding.model,
        "Language model client ready"
    );

    let orchestrator = ChatOrchestrator::new(db, gemini.clone(), gemini, &config);
    let state = AppState::new(config.clone(), orchestrator);
    start_server(&config, state).await?;
    Ok(())
}

fn check_db(config: &BookchatConfig, limit: usize) -> Result<(), Box<dyn Error>> {
    let db = open_database(config)?;
    let catalog = CatalogStore::new(db.clone());

    println!("Tables:");
    for table in catalog.list_tables()? {
        println!("  {}", table);
    }

    let titles = catalog.sample_titles(limit)?;
    if titles.is_empty() {
        println!("No books found.");
    } else {
        println!("Books:");
        for title in titles {
            println!("  {}", title);
        }
    }

    println!("Policies: {}", PolicyStore::new(db).count()?);
    Ok(())
}

async fn list_models(config: &BookchatConfig) -> Result<(), Box<dyn Error>> {
    let client = GeminiClient::new(&config.llm, &config.embedding)?;
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let models = with_timeout(timeout, client.list_models()).await?;

    for model in models.iter().filter(|m| m.supports_generate_content()) {
        println!("{}", model.name);
    }
    Ok(())
}

async fn add_policy(
    config: &BookchatConfig,
    title: String,
    content: String,
) -> Result<(), Box<dyn Error>> {
    let db = open_database(config)?;
    let mut embedding_config = config.embedding.clone();
    embedding_config.task_type = DOCUMENT_TASK_TYPE.to_string();
    let client = GeminiClient::new(&config.llm, &embedding_config)?;

    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let embedding = with_timeout(timeout, client.embed(&content)).await?;
    let dimensions = embedding.len();

    let id = PolicyStore::new(db).insert(&PolicyRecord {
        title,
        content,
        embedding,
    })?;
    info!(id, dimensions, "Policy added");
    println!("Added policy {}", id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let dotenv = dotenvy::dotenv();
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match BookchatConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (BookchatConfig::default(), Some(e)),
    };

    // Tracing.
    let level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    info!("Starting Bookchat v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = &dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }
    match load_error {
        None => info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load configuration, using defaults"
        ),
    }

    // Overrides: env vars, then CLI flags.
    config.apply_env();
    if let Some(path) = &args.database {
        config.database.path = path.clone();
    }
    config.server.port = args.resolve_port(config.server.port);
    config.validate()?;

    match args.command() {
        Command::Serve { .. } => serve(config).await,
        Command::CheckDb { limit } => check_db(&config, limit),
        Command::ListModels => list_models(&config).await,
        Command::AddPolicy { title, content } => add_policy(&config, title, content).await,
    }
}

//! Application state shared across route handlers.

use std::sync::Arc;

use bookchat_chat::ChatOrchestrator;
use bookchat_core::config::BookchatConfig;

/// Shared application state. Immutable after startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BookchatConfig>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    pub fn new(config: BookchatConfig, orchestrator: ChatOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }
}

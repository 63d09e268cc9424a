//! Chat orchestrator: history, classification and dispatch for one request.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use bookchat_core::config::BookchatConfig;
use bookchat_core::types::{ChatRequest, ChatResponse, ConversationTurn, Intent, Role};
use bookchat_llm::{EmbeddingService, LanguageModel};
use bookchat_storage::{CatalogStore, Database, HistoryStore, PolicyStore, QueryLimits};

use crate::blocking::run_blocking;
use crate::chitchat::ChitchatHandler;
use crate::classifier::IntentClassifier;
use crate::database::DatabaseHandler;
use crate::outcome::HandlerOutcome;
use crate::policy::PolicyHandler;

/// Central coordinator that turns a [`ChatRequest`] into a [`ChatResponse`].
pub struct ChatOrchestrator {
    history: HistoryStore,
    classifier: IntentClassifier,
    database: DatabaseHandler,
    policy: PolicyHandler,
    chitchat: ChitchatHandler,
    history_limit: usize,
    record_turns: bool,
}

impl ChatOrchestrator {
    /// Wire the pipeline from a shared database, the two model services and
    /// the loaded configuration.
    pub fn new(
        db: Arc<Database>,
        model: Arc<dyn LanguageModel>,
        embeddings: Arc<dyn EmbeddingService>,
        config: &BookchatConfig,
    ) -> Self {
        let timeout = Duration::from_secs(config.llm.timeout_secs);
        let chat = &config.chat;
        let limits = QueryLimits {
            timeout: Duration::from_millis(config.database.query_timeout_ms),
            max_rows: config.database.max_rows,
        };

        Self {
            history: HistoryStore::new(db.clone()),
            classifier: IntentClassifier::new(model.clone(), timeout),
            database: DatabaseHandler::new(
                model.clone(),
                CatalogStore::new(db.clone()).with_limits(limits),
                config.database.schema_tables.clone(),
                timeout,
            ),
            policy: PolicyHandler::new(
                embeddings,
                PolicyStore::new(db),
                chat.policy_similarity_threshold,
                timeout,
            ),
            chitchat: ChitchatHandler::new(model, timeout),
            history_limit: chat.history_limit,
            record_turns: chat.record_turns,
        }
    }

    /// Answer one question. Never fails: every error along the way has
    /// already become a fixed customer-facing message.
    pub async fn handle(&self, request: &ChatRequest) -> ChatResponse {
        let session_id = request.session_id.as_str();
        let question = request.question.as_str();

        let history = self.load_history(session_id).await;
        info!(session_id, turns = history.len(), "Loaded history");

        let intent = self.classifier.classify(question, &history).await;

        let outcome = match intent {
            Intent::Database => self.database.answer(question, &history).await,
            Intent::Policy => self.policy.answer(question).await,
            Intent::Chitchat => self.chitchat.answer(question, &history).await,
        };

        match &outcome {
            HandlerOutcome::Answered(_) => info!(session_id, %intent, "Answered"),
            HandlerOutcome::Degraded(_, reason) => {
                info!(session_id, %intent, %reason, "Answered with fallback")
            }
        }

        let response = ChatResponse {
            source: intent.source(),
            content: outcome.into_text(),
        };

        if self.record_turns {
            self.record(session_id, question, &response.content).await;
        }

        response
    }

    /// Recent turns, or none if the store cannot be read.
    async fn load_history(&self, session_id: &str) -> Vec<ConversationTurn> {
        let store = self.history.clone();
        let (id, limit) = (session_id.to_string(), self.history_limit);
        match run_blocking(move || store.try_get_history(&id, limit)).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to load chat history");
                Vec::new()
            }
        }
    }

    async fn record(&self, session_id: &str, question: &str, answer: &str) {
        let store = self.history.clone();
        let (id, question, answer) = (
            session_id.to_string(),
            question.to_string(),
            answer.to_string(),
        );
        let result = run_blocking(move || {
            store
                .append_turn(&id, Role::User, &question)
                .and_then(|_| store.append_turn(&id, Role::Assistant, &answer))
        })
        .await;
        if let Err(e) = result {
            warn!(session_id, error = %e, "Failed to record chat turns");
        }
    }
}

//! Conversational fallback: a short, warm reply from the model.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use bookchat_core::types::ConversationTurn;
use bookchat_llm::{with_timeout, LanguageModel};

use crate::outcome::{DegradeReason, HandlerOutcome};
use crate::prompt;

pub struct ChitchatHandler {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ChitchatHandler {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> HandlerOutcome {
        let prompt = prompt::chitchat(question, history);
        match with_timeout(self.timeout, self.model.complete(&prompt)).await {
            Ok(reply) => HandlerOutcome::Answered(reply),
            Err(e) => {
                warn!(error = %e, "Chitchat reply failed");
                HandlerOutcome::degraded(DegradeReason::ChitchatFailed)
            }
        }
    }
}

//! Intent classification through the language model.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use bookchat_core::types::{ConversationTurn, Intent};
use bookchat_llm::{with_timeout, LanguageModel};

use crate::prompt;

/// Labels a question as a catalog, policy or conversational question.
pub struct IntentClassifier {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Classify `question` in the context of `history`.
    ///
    /// Anything other than an exact label, including a failed model call,
    /// falls back to [`Intent::Chitchat`].
    pub async fn classify(&self, question: &str, history: &[ConversationTurn]) -> Intent {
        let prompt = prompt::classify(question, history);
        match with_timeout(self.timeout, self.model.complete(&prompt)).await {
            Ok(raw) => {
                let label = raw.trim();
                match Intent::from_label(label) {
                    Some(intent) => {
                        info!(label, "Classified question");
                        intent
                    }
                    None => {
                        info!(label, "Unrecognized intent label, using chitchat");
                        Intent::Chitchat
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Intent classification failed, using chitchat");
                Intent::Chitchat
            }
        }
    }
}

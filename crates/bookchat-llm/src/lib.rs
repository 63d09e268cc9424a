//! Bookchat LLM crate - language model and embedding service clients.
//!
//! Defines the `LanguageModel` and `EmbeddingService` traits the chat
//! pipeline depends on, a Google Gemini implementation of both, and
//! deterministic mocks for tests.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

pub mod error;
pub mod gemini;
pub mod mock;

pub use error::LlmError;
pub use gemini::{GeminiClient, ModelInfo};
pub use mock::{FixedEmbedding, MockEmbedding, ScriptedModel};

/// A text-completion model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a single-turn prompt and return the model's text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// A service that turns text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Bound an external call by `timeout`, mapping expiry to [`LlmError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout)),
    }
}

//! Deterministic model and embedding doubles for testing.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::{EmbeddingService, LanguageModel};

/// A language model that replays a fixed script of replies in order.
///
/// Every prompt it receives is recorded so tests can assert on what the
/// pipeline sent. Once the script runs out, calls fail with
/// [`LlmError::Unavailable`].
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn then_reply(self, reply: &str) -> Self {
        self.push(Ok(reply.to_string()));
        self
    }

    /// Queue a failed call.
    pub fn then_fail(self, err: LlmError) -> Self {
        self.push(Err(err));
        self
    }

    fn push(&self, reply: Result<String, LlmError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .replies
            .lock()
            .map_err(|e| LlmError::Unavailable(format!("script lock poisoned: {}", e)))?
            .pop_front();
        next.unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }
}

/// Embedding service that returns the same vector for every input.
#[derive(Debug, Clone)]
pub struct FixedEmbedding {
    vector: Option<Vec<f32>>,
}

impl FixedEmbedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
        }
    }

    /// An embedding service whose every call fails.
    pub fn failing() -> Self {
        Self { vector: None }
    }
}

#[async_trait]
impl EmbeddingService for FixedEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        self.vector
            .clone()
            .ok_or_else(|| LlmError::Unavailable("embedding service offline".to_string()))
    }
}

/// Hash-based embeddings: identical text always maps to the same unit vector.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(768)
    }
}

impl MockEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.is_empty() {
            return Err(LlmError::Unavailable("cannot embed empty text".to_string()));
        }
        Ok(self.vector_for(text))
    }
}

//! Error types for model and embedding calls.

use std::time::Duration;

use bookchat_core::error::BookchatError;

/// Errors from the language model and embedding services.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned no content")]
    EmptyResponse,
    #[error("could not decode provider response: {0}")]
    Decode(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

impl From<LlmError> for BookchatError {
    fn from(err: LlmError) -> Self {
        BookchatError::Model(err.to_string())
    }
}

//! Google Gemini client for text generation and embeddings.
//!
//! Talks to the `generativelanguage` REST API: `generateContent` for
//! completions, `embedContent` for query embeddings and `models` for listing
//! what the key can use. The API key travels in the `x-goog-api-key` header
//! so it never appears in logged URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use bookchat_core::config::{EmbeddingConfig, LlmConfig};

use crate::error::LlmError;
use crate::{EmbeddingService, LanguageModel};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    task_type: String,
    temperature: f32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// A model visible to the configured API key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

impl GeminiClient {
    /// Build a client from the model and embedding sections of the config.
    pub fn new(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Result<Self, LlmError> {
        if llm.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: llm.api_key.clone(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: bare_model_name(&llm.model).to_string(),
            embedding_model: bare_model_name(&embedding.model).to_string(),
            task_type: embedding.task_type.clone(),
            temperature: llm.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// List every model the key can see, following pagination.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let body = Self::send(request).await?;
            let page: ListModelsResponse =
                serde_json::from_str(&body).map_err(|e| LlmError::Decode(e.to_string()))?;
            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<String, LlmError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(status = %status, "Gemini API response");

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = generate_request(prompt, self.temperature);

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Sending generateContent");

        let request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body);
        let raw = Self::send(request).await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                prompt_tokens = ?usage.prompt_token_count,
                response_tokens = ?usage.candidates_token_count,
                "Gemini usage"
            );
        }

        extract_text(parsed)
    }
}

#[async_trait]
impl EmbeddingService for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!(
            "{}/models/{}:embedContent",
            self.base_url, self.embedding_model
        );
        let body = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content {
                role: None,
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type: self.task_type.clone(),
        };

        let request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body);
        let raw = Self::send(request).await?;
        let parsed: EmbedResponse =
            serde_json::from_str(&raw).map_err(|e| LlmError::Decode(e.to_string()))?;

        if parsed.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.embedding.values)
    }
}

fn generate_request(prompt: &str, temperature: f32) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        }],
        generation_config: GenerationConfig { temperature },
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateResponse) -> Result<String, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        debug!(finish_reason = ?candidate.finish_reason, "Candidate carried no text");
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

/// `models/gemini-2.0-flash` and `gemini-2.0-flash` name the same model.
fn bare_model_name(name: &str) -> &str {
    name.trim().strip_prefix("models/").unwrap_or(name.trim())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: &str) -> LlmConfig {
        LlmConfig {
            api_key: key.to_string(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = GeminiClient::new(&config_with_key("  "), &EmbeddingConfig::default());
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn test_client_normalizes_names() {
        let mut llm = config_with_key("k");
        llm.model = "models/gemini-2.0-flash".to_string();
        llm.base_url = "https://example.test/v1beta/".to_string();
        let client = GeminiClient::new(&llm, &EmbeddingConfig::default()).unwrap();
        assert_eq!(client.model(), "gemini-2.0-flash");
        assert_eq!(client.base_url, "https://example.test/v1beta");
        assert_eq!(client.embedding_model, "text-embedding-004");
    }

    #[test]
    fn test_generate_request_wire_format() {
        let json = serde_json::to_value(generate_request("xin chào", 0.0)).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "xin chào");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_embed_request_wire_format() {
        let req = EmbedRequest {
            model: "models/text-embedding-004".to_string(),
            content: Content {
                role: None,
                parts: vec![Part {
                    text: "đổi trả".to_string(),
                }],
            },
            task_type: "RETRIEVAL_QUERY".to_string(),
        };
        let json = serde_json::to_value(req).unwrap();
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert!(json["content"].get("role").is_none());
        assert_eq!(json["content"]["parts"][0]["text"], "đổi trả");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "DATA"}, {"text": "BASE"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 1}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "DATABASE");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_extract_text_blocked_candidate() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(matches!(extract_text(parsed), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_embed_response_parsing() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, -0.2, 0.3]}}"#).unwrap();
        assert_eq!(parsed.embedding.values.len(), 3);
    }

    #[test]
    fn test_list_models_parsing() {
        let raw = r#"{"models": [
            {"name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent", "countTokens"]},
            {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]}
        ]}"#;
        let parsed: ListModelsResponse = serde_json::from_str(raw).unwrap();
        let generative: Vec<_> = parsed
            .models
            .iter()
            .filter(|m| m.supports_generate_content())
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(generative, vec!["models/gemini-2.0-flash"]);
        assert!(parsed.next_page_token.is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ổổổổ", 2), "ổổ...");
    }
}

//! OpenRouter-backed language model client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::error::ModelError;

use super::LanguageModel;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's question directly and concisely.";

/// Configuration for an OpenAI-compatible chat completion provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API (e.g., "https://openrouter.ai/api/v1")
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model id sent with every request
    pub model: String,
    /// Request deadline; overruns surface as `ModelError::Timeout`
    pub timeout_secs: u64,
    /// Extra headers to include in requests (e.g., X-Title, HTTP-Referer)
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderConfig {
    /// Create an OpenRouter provider configuration.
    pub fn openrouter(api_key: String, model: String) -> Self {
        Self {
            base_url: OPENROUTER_BASE_URL.to_string(),
            api_key,
            model,
            timeout_secs: 60,
            extra_headers: vec![(
                "X-Title".to_string(),
                "Reflex".to_string(),
            )],
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Chat completion client for OpenRouter and other OpenAI-compatible
/// providers.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    provider: ProviderConfig,
}

impl OpenRouterClient {
    pub fn new(provider: ProviderConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(provider.timeout_secs))
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        Ok(Self { client, provider })
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ModelError> {
        let request = ChatRequest {
            model: self.provider.model.clone(),
            messages,
            max_tokens: Some(1024),
        };

        let mut req_builder = self
            .client
            .post(format!("{}/chat/completions", self.provider.base_url))
            .header("Authorization", format!("Bearer {}", self.provider.api_key));
        for (key, value) in &self.provider.extra_headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let response = req_builder.json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.provider.timeout_secs)
            } else {
                ModelError::Unavailable(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(format!("{}: {}", status, body)));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.provider.timeout_secs)
            } else {
                ModelError::Unavailable(e.to_string())
            }
        })?;

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ModelError::Unavailable(format!("unparseable response: {}", e)))?;

        Ok(extract_content(&raw))
    }
}

/// Pull the assistant text out of a chat completion response.
/// Handles both plain-string content and array-of-content-parts, which
/// varies by model.
fn extract_content(raw: &serde_json::Value) -> String {
    let content = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"));

    match content {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                if part.get("type").and_then(|t| t.as_str()) == Some("text") {
                    part.get("text").and_then(|t| t.as_str()).map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: prompt.to_string(),
            },
        ];
        self.complete(messages).await
    }
}

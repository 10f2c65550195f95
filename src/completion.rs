//! Completion provider abstraction.
//!
//! A completion provider turns `(model, prompt)` into generated text. It is
//! used twice: once per query to synthesize the answer, and once per
//! ingested record to rate code cleanliness.
//!
//! | Config Value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"disabled"` | [`DisabledCompletion`] | |
//! | `"openai"` | [`OpenAICompletion`] | `POST {url}/v1/chat/completions` |
//! | `"ollama"` | [`OllamaCompletion`] | `POST {url}/api/generate` |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::http::{client_with_timeout, send_with_retry};

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate text for `prompt` with `model`. The reply is returned verbatim.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CompletionError>;
}

pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Disabled)
    }
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and compatible gateways.
pub struct OpenAICompletion {
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAICompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CompletionError::Config(format!("{} environment variable not set", config.api_key_env))
        })?;
        let client = client_with_timeout(config.timeout_secs)
            .map_err(|e| CompletionError::Config(e.to_string()))?;
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletion {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        let endpoint = format!("{}/v1/chat/completions", self.url.trim_end_matches('/'));
        let req = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = send_with_retry("openai chat", self.max_retries, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
        })
        .await
        .map_err(|e| CompletionError::Request(e.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Malformed("no choices in response".into()))
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaCompletion {
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = client_with_timeout(config.timeout_secs)
            .map_err(|e| CompletionError::Config(e.to_string()))?;
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = send_with_retry("ollama generate", self.max_retries, || {
            self.client.post(&endpoint).json(&req)
        })
        .await
        .map_err(|e| CompletionError::Request(e.to_string()))?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        Ok(body.response)
    }
}

pub fn create_completion_provider(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionProvider>, CompletionError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "openai" => Ok(Arc::new(OpenAICompletion::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompletion::new(config)?)),
        other => Err(CompletionError::Config(format!(
            "Unknown completion provider: {}",
            other
        ))),
    }
}

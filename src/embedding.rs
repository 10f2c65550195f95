//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible `/v1/embeddings` endpoint.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`**: runs a fastembed model in-process (feature
//!   `local-embeddings-fastembed`).
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`]: compute similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use commit_rag::config::EmbeddingConfig;
//! # use commit_rag::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::http::{client_with_timeout, send_with_retry};

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Reject empty vectors and vectors whose length differs from `dims`.
fn check_vector(vec: Vec<f32>, dims: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vec.is_empty() {
        return Err(EmbeddingError::EmptyVector);
    }
    if dims > 0 && vec.len() != dims {
        return Err(EmbeddingError::Malformed(format!(
            "expected {} dimensions, got {}",
            dims,
            vec.len()
        )));
    }
    if vec.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::Malformed("non-finite component".into()));
    }
    Ok(vec)
}

fn json_floats(value: &serde_json::Value, what: &str) -> Result<Vec<f32>, EmbeddingError> {
    value
        .as_array()
        .ok_or_else(|| EmbeddingError::Malformed(format!("{} is not an array", what)))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::Malformed(format!("{} has a non-numeric entry", what)))
        })
        .collect()
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using an OpenAI-compatible API.
///
/// Calls `POST {url}/v1/embeddings`; `url` defaults to
/// `https://api.openai.com`. The API key is read once, at construction,
/// from the environment variable named by `embedding.api_key_env`.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| EmbeddingError::Config("embedding.model required for OpenAI provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| EmbeddingError::Config("embedding.dims required for OpenAI provider".into()))?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            EmbeddingError::Config(format!("{} environment variable not set", config.api_key_env))
        })?;
        let client = client_with_timeout(config.timeout_secs)
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self {
            model,
            dims,
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
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = format!("{}/v1/embeddings", self.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = send_with_retry("openai embeddings", self.max_retries, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        check_vector(parse_openai_response(&json)?, self.dims)
    }
}

/// Extract `data[0].embedding` from an OpenAI embeddings response.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .ok_or_else(|| EmbeddingError::Malformed("missing data[0].embedding".into()))?;
    json_floats(embedding, "embedding")
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| EmbeddingError::Config("embedding.model required for Ollama provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| EmbeddingError::Config("embedding.dims required for Ollama provider".into()))?;
        let client = client_with_timeout(config.timeout_secs)
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self {
            model,
            dims,
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
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = send_with_retry("ollama embed", self.max_retries, || {
            self.client.post(&endpoint).json(&body)
        })
        .await
        .map_err(|e| {
            EmbeddingError::Request(format!("(is Ollama running at {}?) {}", self.url, e))
        })?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        let first = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
            .ok_or_else(|| EmbeddingError::Malformed("missing embeddings[0]".into()))?;

        check_vector(json_floats(first, "embedding")?, self.dims)
    }
}

// ============ Local Provider (fastembed) ============

/// In-process embedding via fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached;
/// afterwards no network calls are made.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "bge-base-en-v1.5".to_string());
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or(match model_name.as_str() {
            "all-minilm-l6-v2" | "bge-small-en-v1.5" => 384,
            "bge-large-en-v1.5" => 1024,
            _ => 768,
        });
        Ok(Self {
            model_name,
            dims,
            model: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        other => Err(EmbeddingError::Config(format!(
            "Unknown local embedding model: '{}'",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model_id = config_to_fastembed_model(&self.model_name)?;
        let slot = self.model.clone();
        let text = text.to_string();

        let vec = tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|e| EmbeddingError::Request(format!("model lock poisoned: {}", e)))?;
            if guard.is_none() {
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model_id).with_show_download_progress(true),
                )
                .map_err(|e| EmbeddingError::Config(format!("Failed to initialize local model: {}", e)))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| EmbeddingError::Request("local model unavailable".into()))?;
            let mut out = model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::Request(e.to_string()))?;
            out.pop().ok_or(EmbeddingError::EmptyVector)
        })
        .await
        .map_err(|e| EmbeddingError::Request(e.to_string()))??;

        check_vector(vec, self.dims)
    }
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings-fastembed`) |
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(EmbeddingError::Config(
            "Local embedding provider requires --features local-embeddings-fastembed".into(),
        )),
        other => Err(EmbeddingError::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use commit_rag::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two embedding vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or zero
/// vectors; callers that must treat those as errors check beforehand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

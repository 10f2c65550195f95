//! TOML configuration.
//!
//! Every connection parameter the pipelines need lives in [`Config`], which
//! is loaded once by the binary and passed by reference into the ingestion
//! pipeline, query engine and server. Secrets are not stored in the file:
//! the file names the environment variables that hold them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Maximum number of commit detail requests in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_fetch_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            default_limit: default_limit(),
            concurrency: default_concurrency(),
            max_retries: default_fetch_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_limit() -> usize {
    50
}
fn default_concurrency() -> usize {
    4
}
fn default_fetch_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible gateways, Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_openai_key_env(),
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model used for both answers and cleanliness ratings.
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_completion_model(),
            url: None,
            api_key_env: default_openai_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_completion_model() -> String {
    "mistral-large".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_completion_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Where the analyze stage writes its JSON array.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    /// Number of full file patches kept per commit.
    #[serde(default = "default_max_code_snippets")]
    pub max_code_snippets: usize,
    /// Records embedded and rated concurrently during upsert.
    #[serde(default = "default_upsert_concurrency")]
    pub upsert_concurrency: usize,
    /// Overall deadline for one ingestion run; `None` waits indefinitely.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            max_code_snippets: default_max_code_snippets(),
            upsert_concurrency: default_upsert_concurrency(),
            deadline_secs: None,
        }
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("./data/app.json")
}
fn default_max_code_snippets() -> usize {
    3
}
fn default_upsert_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of records handed to the completion model as context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            deadline_secs: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Drop and recreate the commit table every time setup runs.
    ///
    /// Destructive: all stored commit records are lost.
    #[serde(default)]
    pub reset_on_setup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Configuration with every section defaulted and the given database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            github: GithubConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.github.concurrency < 1 {
        anyhow::bail!("github.concurrency must be >= 1");
    }
    if config.ingest.upsert_concurrency < 1 {
        anyhow::bail!("ingest.upsert_concurrency must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0");
        }
        // The local provider falls back to a default model and its known width.
        if config.embedding.provider != "local" {
            if config.embedding.dims.is_none() {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.completion.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

//! Wiring from [`Config`] to live components.
//!
//! Opens the database once and builds the providers named in the config.
//! The CLI builds one [`Services`] per command; the HTTP server builds one
//! at startup and shares it across requests.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::completion::{create_completion_provider, CompletionProvider};
use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::github::CommitFetcher;
use crate::ingest::{artifact_path_for, IngestPipeline};
use crate::migrate::run_migrations;
use crate::qa_log::{QaLog, SqliteQaLog};
use crate::query::QueryEngine;
use crate::store::{SqliteVectorStore, VectorStore};

#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub store: Arc<dyn VectorStore>,
    pub log: Arc<dyn QaLog>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completion: Arc<dyn CompletionProvider>,
}

impl Services {
    /// Open the database and construct the configured providers.
    ///
    /// Does not create tables; call [`Services::setup`] or
    /// [`Services::ensure_tables`] for that.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let embedder = create_provider(&config.embedding)
            .with_context(|| format!("embedding provider '{}'", config.embedding.provider))?;
        let completion = create_completion_provider(&config.completion)
            .with_context(|| format!("completion provider '{}'", config.completion.provider))?;

        Ok(Self {
            config: Arc::new(config.clone()),
            store: Arc::new(SqliteVectorStore::new(pool.clone())),
            log: Arc::new(SqliteQaLog::new(pool)),
            embedder,
            completion,
        })
    }

    /// Create missing tables, dropping the commit table first when `reset`
    /// or `store.reset_on_setup` is set.
    pub async fn setup(&self, reset: bool) -> Result<()> {
        let reset = reset || self.config.store.reset_on_setup;
        run_migrations(self.store.as_ref(), self.log.as_ref(), reset).await?;
        Ok(())
    }

    /// Create missing tables without ever dropping anything.
    pub async fn ensure_tables(&self) -> Result<()> {
        run_migrations(self.store.as_ref(), self.log.as_ref(), false).await?;
        Ok(())
    }

    pub fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            (*self.config).clone(),
            self.embedder.clone(),
            self.completion.clone(),
            self.store.clone(),
        )
    }

    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(
            (*self.config).clone(),
            self.embedder.clone(),
            self.completion.clone(),
            self.store.clone(),
            self.log.clone(),
        )
    }

    pub fn fetcher(&self) -> Result<CommitFetcher> {
        Ok(CommitFetcher::new(&self.config.github)?)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.config.ingest.artifact_path.clone()
    }

    /// A fresh artifact path for one analysis of `owner/repo`, next to the
    /// configured `ingest.artifact_path`.
    pub fn request_artifact_path(&self, owner: &str, repo: &str) -> PathBuf {
        artifact_path_for(&self.config.ingest.artifact_path, owner, repo)
    }
}

//! Retrieval-augmented question answering over stored commits.
//!
//! A question moves through these stages:
//!
//! ```text
//! Received → Embedded → Retrieved → Answered → Logged
//!     └──────────┴──────────┴──────────┴─→ Failed
//! ```
//!
//! Nothing partial is returned from a failed query. A failure to log an
//! answered question is not a query failure: the answer is returned with
//! the log error attached and the stage left at `Answered`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::completion::CompletionProvider;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::QueryError;
use crate::models::{QueryLogEntry, SearchHit};
use crate::qa_log::QaLog;
use crate::store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStage {
    Received,
    Embedded,
    Retrieved,
    Answered,
    Logged,
    Failed,
}

/// What a successful query produced.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub question: String,
    pub answer: String,
    pub hits: Vec<SearchHit>,
    pub stage: QueryStage,
    pub log_entry: Option<QueryLogEntry>,
    pub log_error: Option<String>,
}

impl QueryOutcome {
    pub fn shas(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.record.sha.as_str()).collect()
    }
}

/// Join the combined texts of `hits` with blank lines, best match first.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.record.combined_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Given this information about some code commits:\n\n{}\n\n\
         User question: {}\n\nPlease provide a relevant answer:",
        context, question
    )
}

pub struct QueryEngine {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    store: Arc<dyn VectorStore>,
    log: Arc<dyn QaLog>,
}

impl QueryEngine {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        log: Arc<dyn QaLog>,
    ) -> Self {
        Self {
            config,
            embedder,
            completion,
            store,
            log,
        }
    }

    /// Answer `question` using the configured `retrieval.top_k`.
    pub async fn ask(&self, question: &str) -> Result<QueryOutcome, QueryError> {
        self.ask_with_top_k(question, self.config.retrieval.top_k)
            .await
    }

    pub async fn ask_with_top_k(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<QueryOutcome, QueryError> {
        let result = match self.config.retrieval.deadline_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), self.run(question, top_k))
                .await
                .unwrap_or(Err(QueryError::Timeout(secs))),
            None => self.run(question, top_k).await,
        };

        if let Err(e) = &result {
            tracing::warn!(stage = ?QueryStage::Failed, error = %e, "query failed");
        }
        result
    }

    async fn run(&self, question: &str, top_k: usize) -> Result<QueryOutcome, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }
        tracing::debug!(stage = ?QueryStage::Received, "query received");

        let query_vec = self
            .embedder
            .embed(question)
            .await
            .map_err(QueryError::Embedding)?;
        tracing::debug!(stage = ?QueryStage::Embedded, dims = query_vec.len());

        let hits = self
            .store
            .search(&query_vec, top_k)
            .await
            .map_err(QueryError::Retrieval)?;
        tracing::debug!(stage = ?QueryStage::Retrieved, hits = hits.len());

        let prompt = build_prompt(&build_context(&hits), question);
        let answer = self
            .completion
            .complete(&self.config.completion.model, &prompt)
            .await
            .map_err(QueryError::Completion)?;
        tracing::debug!(stage = ?QueryStage::Answered, chars = answer.len());

        let (stage, log_entry, log_error) = match self.log.append(question, &answer).await {
            Ok(entry) => (QueryStage::Logged, Some(entry), None),
            Err(e) => {
                tracing::warn!(error = %e, "answer not logged");
                (QueryStage::Answered, None, Some(e.to_string()))
            }
        };

        tracing::info!(hits = hits.len(), ?stage, "query answered");
        Ok(QueryOutcome {
            question: question.to_string(),
            answer,
            hits,
            stage,
            log_entry,
            log_error,
        })
    }
}

//! Ingestion pipeline orchestration.
//!
//! Two stages with a JSON artifact on disk between them:
//!
//! 1. **Analyze**: fetch commits → summarize diffs → write the artifact.
//! 2. **Upsert**: read the artifact → build combined text → embed → rate
//!    cleanliness → insert into the vector store.
//!
//! The artifact is the recovery point: if upsert fails part way, fix the
//! cause and re-run upsert on the same file. Upsert does not deduplicate, so
//! records inserted before the failure are inserted again unless the table
//! is reset first.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::completion::CompletionProvider;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{ArtifactError, EmbeddingError, IngestError};
use crate::github::CommitFetcher;
use crate::models::{AnalyzedCommit, ArtifactRecord, CommitRecord};
use crate::rating::rate_cleanliness;
use crate::record::{analyze_commit, UpsertInput};
use crate::store::VectorStore;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub commits_analyzed: usize,
    pub records_upserted: usize,
    pub artifact_path: Option<PathBuf>,
}

pub struct IngestPipeline {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionProvider>,
    store: Arc<dyn VectorStore>,
}

impl IngestPipeline {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            completion,
            store,
        }
    }

    /// Fetch and summarize the `limit` most recent commits.
    pub async fn analyze(
        &self,
        fetcher: &CommitFetcher,
        owner: &str,
        repo: &str,
        limit: usize,
    ) -> Result<Vec<AnalyzedCommit>, IngestError> {
        let commits = fetcher.fetch_commits(owner, repo, limit).await?;
        let max_snippets = self.config.ingest.max_code_snippets;
        Ok(commits
            .iter()
            .map(|c| analyze_commit(c, max_snippets))
            .collect())
    }

    /// Analyze stage: fetch, summarize and write the artifact to `output`.
    pub async fn run_analyze(
        &self,
        fetcher: &CommitFetcher,
        owner: &str,
        repo: &str,
        limit: usize,
        output: &Path,
    ) -> Result<IngestReport, IngestError> {
        with_deadline(self.config.ingest.deadline_secs, async {
            let analyzed = self.analyze(fetcher, owner, repo, limit).await?;
            write_artifact(output, &analyzed)?;
            tracing::info!(
                commits = analyzed.len(),
                path = %output.display(),
                "wrote artifact"
            );
            Ok::<_, IngestError>(IngestReport {
                commits_analyzed: analyzed.len(),
                records_upserted: 0,
                artifact_path: Some(output.to_path_buf()),
            })
        })
        .await
    }

    /// Upsert stage: read the artifact at `path` and store every record.
    pub async fn run_upsert(&self, path: &Path) -> Result<IngestReport, IngestError> {
        with_deadline(self.config.ingest.deadline_secs, async {
            let records = read_artifact(path)?;
            let inputs: Vec<UpsertInput> = records.iter().map(UpsertInput::from_artifact).collect();
            let upserted = self.upsert(inputs).await?;
            Ok::<_, IngestError>(IngestReport {
                commits_analyzed: 0,
                records_upserted: upserted,
                artifact_path: Some(path.to_path_buf()),
            })
        })
        .await
    }

    /// Both stages back to back.
    ///
    /// The artifact is still written to `artifact` as a recovery point, but
    /// the upsert works from the batch just analyzed, so concurrent runs
    /// sharing a path never store each other's commits.
    pub async fn run_ingest(
        &self,
        fetcher: &CommitFetcher,
        owner: &str,
        repo: &str,
        limit: usize,
        artifact: &Path,
    ) -> Result<IngestReport, IngestError> {
        with_deadline(self.config.ingest.deadline_secs, async {
            let analyzed = self.analyze(fetcher, owner, repo, limit).await?;
            write_artifact(artifact, &analyzed)?;

            let inputs: Vec<UpsertInput> = analyzed.iter().map(UpsertInput::from).collect();
            let upserted = self.upsert(inputs).await?;

            Ok::<_, IngestError>(IngestReport {
                commits_analyzed: analyzed.len(),
                records_upserted: upserted,
                artifact_path: Some(artifact.to_path_buf()),
            })
        })
        .await
    }

    /// Embed, rate and insert each input in order.
    ///
    /// Preparation (embedding and rating) runs `upsert_concurrency` records
    /// ahead; inserts are sequential. The first failure stops the run and
    /// leaves earlier records stored.
    pub async fn upsert(&self, inputs: Vec<UpsertInput>) -> Result<usize, IngestError> {
        let total = inputs.len();
        let concurrency = self.config.ingest.upsert_concurrency.max(1);

        let mut prepared = pin!(stream::iter(inputs.into_iter().enumerate())
            .map(|(index, input)| async move { (index, self.prepare(index, input).await) })
            .buffered(concurrency));

        let mut inserted = 0;
        while let Some((index, result)) = prepared.next().await {
            let record = result?;
            self.store
                .insert(&record)
                .await
                .map_err(|source| IngestError::Store {
                    index,
                    sha: record.sha.clone(),
                    source,
                })?;
            inserted += 1;
            tracing::debug!(
                index,
                sha = %record.sha,
                rating = record.cleanliness_rating,
                "stored record"
            );
        }

        tracing::info!(inserted, total, "upsert complete");
        Ok(inserted)
    }

    async fn prepare(&self, index: usize, input: UpsertInput) -> Result<CommitRecord, IngestError> {
        let text = input.combined_text();

        let vector = self
            .embedder
            .embed(&text)
            .await
            .and_then(|v| {
                if v.is_empty() {
                    Err(EmbeddingError::EmptyVector)
                } else {
                    Ok(v)
                }
            })
            .map_err(|source| IngestError::Embedding {
                index,
                sha: input.sha.clone(),
                source,
            })?;

        let rating = rate_cleanliness(
            self.completion.as_ref(),
            &self.config.completion.model,
            &input.code,
        )
        .await;

        Ok(input.into_record(vector, rating))
    }
}

async fn with_deadline<T, F>(secs: Option<u64>, fut: F) -> Result<T, IngestError>
where
    F: Future<Output = Result<T, IngestError>>,
{
    match secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| IngestError::Timeout(secs))?,
        None => fut.await,
    }
}

/// Write the analyze stage's output as one pretty-printed JSON array.
///
/// The file is written to a uniquely named temp file in the same directory
/// and persisted over `path`, so an existing artifact is replaced whole or
/// not at all, even with several writers.
pub fn write_artifact(path: &Path, commits: &[AnalyzedCommit]) -> Result<(), ArtifactError> {
    let io_err = |source: std::io::Error| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let json = serde_json::to_string_pretty(commits)
        .map_err(|e| io_err(std::io::Error::other(e)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// A per-run artifact path next to `base`: `{stem}-{owner}-{repo}-{timestamp}.json`.
pub fn artifact_path_for(base: &Path, owner: &str, repo: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let name = format!(
        "{}-{}-{}-{}.json",
        stem,
        sanitize(owner),
        sanitize(repo),
        chrono::Utc::now().format("%Y%m%dT%H%M%S%6f")
    );
    base.with_file_name(name)
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Read an artifact written by [`write_artifact`] or by hand in the flat shape.
pub fn read_artifact(path: &Path) -> Result<Vec<ArtifactRecord>, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        path: path.display().to_string(),
        source,
    })
}

//! Commit fetcher for the GitHub REST v3 API.
//!
//! Two calls per commit: one list request for the most recent summaries,
//! then one detail request per summary for its file changes. Detail
//! requests run with bounded concurrency and come back in list order.
//!
//! Any non-success response aborts the whole batch; there are no partial
//! results.

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::GithubConfig;
use crate::error::FetchError;
use crate::http::{client_with_timeout, send_with_retry, HttpFailure};
use crate::models::{CommitDetail, CommitSummary, RawCommit};

/// GitHub caps `per_page` at 100.
pub const MAX_PER_PAGE: usize = 100;

const ACCEPT: &str = "application/vnd.github.v3+json";

pub struct CommitFetcher {
    api_base: String,
    token: String,
    concurrency: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl CommitFetcher {
    /// Build a fetcher, reading the token from the environment variable
    /// named by `config.token_env`.
    pub fn new(config: &GithubConfig) -> Result<Self, FetchError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| FetchError::MissingToken(config.token_env.clone()))?;
        Self::with_token(config, token)
    }

    pub fn with_token(config: &GithubConfig, token: impl Into<String>) -> Result<Self, FetchError> {
        let client = client_with_timeout(config.timeout_secs).map_err(|e| FetchError::Network {
            url: config.api_base.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            concurrency: config.concurrency.max(1),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = send_with_retry("github", self.max_retries, || {
            self.client
                .get(url)
                .bearer_auth(&self.token)
                .header(reqwest::header::ACCEPT, ACCEPT)
        })
        .await
        .map_err(|failure| match failure {
            HttpFailure::Status { status, body } => FetchError::Status {
                status,
                url: url.to_string(),
                body,
            },
            HttpFailure::Network(reason) => FetchError::Network {
                url: url.to_string(),
                reason,
            },
        })?;

        response.json::<T>().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// The `limit` most recent commit summaries, newest first.
    pub async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        limit: usize,
    ) -> Result<Vec<CommitSummary>, FetchError> {
        let per_page = limit.clamp(1, MAX_PER_PAGE);
        let url = format!(
            "{}/repos/{}/{}/commits?per_page={}",
            self.api_base, owner, repo, per_page
        );
        let mut summaries: Vec<CommitSummary> = self.get_json(&url).await?;
        summaries.truncate(per_page);
        tracing::info!(owner, repo, count = summaries.len(), "listed commits");
        Ok(summaries)
    }

    pub async fn fetch_commit_detail(&self, url: &str) -> Result<CommitDetail, FetchError> {
        self.get_json(url).await
    }

    /// List and then fetch every commit's details.
    pub async fn fetch_commits(
        &self,
        owner: &str,
        repo: &str,
        limit: usize,
    ) -> Result<Vec<RawCommit>, FetchError> {
        let summaries = self.list_commits(owner, repo, limit).await?;

        let commits: Vec<RawCommit> = stream::iter(summaries)
            .map(|summary| async move {
                let detail = self.fetch_commit_detail(&summary.url).await?;
                tracing::debug!(sha = %summary.sha, files = detail.files.len(), "fetched commit");
                Ok::<_, FetchError>(to_raw_commit(summary, detail))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(commits)
    }
}

fn to_raw_commit(summary: CommitSummary, detail: CommitDetail) -> RawCommit {
    let author = summary.commit.author.unwrap_or_default();
    RawCommit {
        sha: summary.sha,
        message: summary.commit.message,
        author: author.name,
        date: author.date,
        files: detail.files,
    }
}

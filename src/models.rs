//! Core data models used throughout commit-rag.
//!
//! Three families of types flow through the system:
//!
//! - **Hosting API shapes** ([`CommitSummary`], [`CommitDetail`], [`FileChange`])
//!   mirror the GitHub REST v3 JSON and only live for the duration of a fetch.
//! - **Artifact shapes** ([`AnalyzedCommit`], [`ArtifactRecord`]) are what the
//!   analyze stage writes to disk and the upsert stage reads back.
//! - **Stored shapes** ([`CommitRecord`], [`QueryLogEntry`]) are what the
//!   vector store and Q&A log persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Hosting API ============

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    /// API URL of the commit detail resource.
    pub url: String,
    pub commit: CommitMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitMeta {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
}

/// Response of `GET {commit.url}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub commit: CommitMeta,
    #[serde(default)]
    pub files: Vec<FileChange>,
}

/// Change status of a file within a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Per-file diff entry of a commit detail.
#[derive(Debug, Clone, Deserialize)]
pub struct FileChange {
    #[serde(default = "unknown_filename")]
    pub filename: String,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub previous_filename: Option<String>,
    #[serde(default)]
    pub patch: Option<String>,
}

fn unknown_filename() -> String {
    "unknown".to_string()
}

/// A commit with its file changes, flattened out of the two API calls.
#[derive(Debug, Clone)]
pub struct RawCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: String,
    pub files: Vec<FileChange>,
}

// ============ Artifact ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitStats {
    pub total_files_changed: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
}

/// One element of the analyze stage's JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: String,
    pub files_changed: Vec<String>,
    /// `"File: {filename}\n{patch}"` for the first few patched files.
    pub code_changes: Vec<String>,
    pub analysis: String,
    pub stats: CommitStats,
}

/// Lenient reading of an artifact element.
///
/// Accepts both the [`AnalyzedCommit`] shape and the flat
/// `{sha, author, code, explanation, "files edited"}` shape. See
/// [`crate::record::UpsertInput::from_artifact`] for how the fields are
/// resolved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactRecord {
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default, rename = "files edited", alias = "files_edited")]
    pub files_edited: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub files_changed: Option<Vec<String>>,
    #[serde(default)]
    pub code_changes: Option<Vec<String>>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub stats: Option<CommitStats>,
}

// ============ Stored ============

/// The embedded unit persisted in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub code: String,
    pub explanation: String,
    pub files_edited: u64,
    /// Exact text that was embedded.
    pub combined_text: String,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub cleanliness_rating: f64,
}

/// A record returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Storage row id; insertion order.
    pub id: i64,
    pub record: CommitRecord,
    pub similarity: f32,
}

/// One answered question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate view over the commit table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepoAnalytics {
    pub num_authors: i64,
    pub num_commits: i64,
    /// `None` when the table is empty.
    pub mean_cleanliness: Option<f64>,
}

//! Error taxonomy for the ingestion and query pipelines.
//!
//! Each external boundary has its own error type so callers can decide what
//! is fatal and what is recovered:
//!
//! | Error | Raised by | Policy |
//! |-------|-----------|--------|
//! | [`FetchError`] | commit fetcher | fatal, aborts the batch |
//! | [`EmbeddingError`] | embedding provider | fatal for the record / question |
//! | [`CompletionError`] | completion provider | fatal for queries, recovered when rating |
//! | [`RatingParseError`] | cleanliness rating | always recovered to the default rating |
//! | [`StoreError`] | vector store | fatal |
//! | [`LogError`] | Q&A log | recovered, the answer is still returned |
//! | [`ArtifactError`] | artifact read/write | fatal |

use thiserror::Error;

/// Failures talking to the source-control hosting API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("hosting API returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("missing hosting API token: environment variable {0} is not set")]
    MissingToken(String),
}

/// Failures producing an embedding vector.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding provider is disabled")]
    Disabled,

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("provider returned an empty vector")]
    EmptyVector,

    #[error("embedding provider misconfigured: {0}")]
    Config(String),
}

/// Failures producing a completion.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Completion provider is disabled")]
    Disabled,

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("malformed completion response: {0}")]
    Malformed(String),

    #[error("completion provider misconfigured: {0}")]
    Config(String),
}

/// A cleanliness reply that is not a number in the rubric's range.
#[derive(Error, Debug, PartialEq)]
pub enum RatingParseError {
    #[error("rating reply is not a number: {0:?}")]
    NotANumber(String),

    #[error("rating {0} is outside 1..=10")]
    OutOfRange(f64),
}

/// Vector store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("vector dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("vector store unavailable: {0}")]
    Unavailable(String),
}

/// Q&A log append failures.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("failed to store query-answer pair: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to store query-answer pair: {0}")]
    Unavailable(String),
}

/// Intermediate artifact failures.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is not a JSON array of commit objects: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort an ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("record {index} ({sha}): {source}")]
    Embedding {
        index: usize,
        sha: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("record {index} ({sha}): {source}")]
    Store {
        index: usize,
        sha: String,
        #[source]
        source: StoreError,
    },

    #[error("vector store setup failed: {0}")]
    Setup(#[source] StoreError),

    #[error("Q&A log setup failed: {0}")]
    LogSetup(#[source] LogError),

    #[error("ingestion timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors that abort a query before an answer exists.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("Failed to generate embedding: {0}")]
    Embedding(#[source] EmbeddingError),

    #[error("Similarity search failed: {0}")]
    Retrieval(#[source] StoreError),

    #[error("Failed to generate answer: {0}")]
    Completion(#[source] CompletionError),

    #[error("query timed out after {0} seconds")]
    Timeout(u64),
}

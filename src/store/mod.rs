//! Vector store abstraction.
//!
//! The [`VectorStore`] trait defines everything the ingestion pipeline and
//! query engine need from persistence. Search is brute force: every stored
//! vector is scored against the query on each call, which is fine at the
//! size of a single repository's history and nothing more.
//!
//! Ranking is shared by all backends through [`rank`]: cosine similarity
//! descending, ties broken by insertion order (lower row id first).
//!
//! Backends:
//! - [`sqlite::SqliteVectorStore`]: the default, persistent store
//! - [`memory::InMemoryVectorStore`]: for tests and embedding in other programs

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, l2_norm};
use crate::error::StoreError;
use crate::models::{CommitRecord, RepoAnalytics, SearchHit};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Persistence for embedded commit records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_table`](VectorStore::ensure_table) | Create the table if missing |
/// | [`reset_table`](VectorStore::reset_table) | Drop and recreate (destructive) |
/// | [`insert`](VectorStore::insert) | Append one record, no dedup |
/// | [`search`](VectorStore::search) | Top-k by cosine similarity |
/// | [`count`](VectorStore::count) | Number of stored records |
/// | [`analytics`](VectorStore::analytics) | Authors / commits / mean rating |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_table(&self) -> Result<(), StoreError>;

    /// Drop every stored record and recreate the table.
    async fn reset_table(&self) -> Result<(), StoreError>;

    /// Append a record and return its row id.
    ///
    /// Fails with [`StoreError::DimensionMismatch`] if the store already
    /// holds vectors of a different length.
    async fn insert(&self, record: &CommitRecord) -> Result<i64, StoreError>;

    /// Return the `min(k, N)` most similar records.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn analytics(&self) -> Result<RepoAnalytics, StoreError>;
}

/// Reject vectors that cannot take part in cosine similarity.
pub fn validate_vector(v: &[f32]) -> Result<(), StoreError> {
    if v.is_empty() {
        return Err(StoreError::InvalidVector("vector is empty".into()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(StoreError::InvalidVector("vector has non-finite components".into()));
    }
    if l2_norm(v) < f32::EPSILON {
        return Err(StoreError::InvalidVector("zero vector has no direction".into()));
    }
    Ok(())
}

/// Score `candidates` against `query` and keep the best `k`.
///
/// `candidates` are `(row id, record)` pairs in any order. The result is
/// sorted by similarity descending, then row id ascending.
pub fn rank(
    query: &[f32],
    candidates: Vec<(i64, CommitRecord)>,
    k: usize,
) -> Result<Vec<SearchHit>, StoreError> {
    validate_vector(query)?;

    let mut hits = Vec::with_capacity(candidates.len());
    for (id, record) in candidates {
        if record.vector.len() != query.len() {
            return Err(StoreError::DimensionMismatch {
                expected: record.vector.len(),
                actual: query.len(),
            });
        }
        let similarity = cosine_similarity(query, &record.vector);
        hits.push(SearchHit {
            id,
            record,
            similarity,
        });
    }

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    hits.truncate(k);
    Ok(hits)
}

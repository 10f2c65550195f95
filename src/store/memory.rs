//! In-memory [`VectorStore`] for tests and embedding in other programs.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Row ids are handed
//! out from a counter so ranking ties break the same way as in SQLite.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{CommitRecord, RepoAnalytics, SearchHit};

use super::{rank, validate_vector, VectorStore};

struct Rows {
    next_id: i64,
    records: Vec<(i64, CommitRecord)>,
}

pub struct InMemoryVectorStore {
    rows: RwLock<Rows>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Rows {
                next_id: 1,
                records: Vec::new(),
            }),
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("in-memory store lock poisoned".into())
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_table(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn reset_table(&self) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        rows.records.clear();
        Ok(())
    }

    async fn insert(&self, record: &CommitRecord) -> Result<i64, StoreError> {
        validate_vector(&record.vector)?;
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;

        if let Some((_, existing)) = rows.records.first() {
            if existing.vector.len() != record.vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: existing.vector.len(),
                    actual: record.vector.len(),
                });
            }
        }

        let id = rows.next_id;
        rows.next_id += 1;
        rows.records.push((id, record.clone()));
        Ok(id)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let candidates = {
            let rows = self.rows.read().map_err(|_| Self::poisoned())?;
            rows.records.clone()
        };
        rank(query, candidates, k)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.records.len() as i64)
    }

    async fn analytics(&self) -> Result<RepoAnalytics, StoreError> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        let authors: HashSet<&str> = rows
            .records
            .iter()
            .map(|(_, r)| r.author.as_str())
            .collect();
        let n = rows.records.len();
        let mean = if n == 0 {
            None
        } else {
            Some(rows.records.iter().map(|(_, r)| r.cleanliness_rating).sum::<f64>() / n as f64)
        };

        Ok(RepoAnalytics {
            num_authors: authors.len() as i64,
            num_commits: n as i64,
            mean_cleanliness: mean,
        })
    }
}

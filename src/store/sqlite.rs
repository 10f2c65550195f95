//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to their
//! dimensionality. Similarity is computed in Rust over every row.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::StoreError;
use crate::models::{CommitRecord, RepoAnalytics, SearchHit};

use super::{rank, validate_vector, VectorStore};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS commit_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sha TEXT NOT NULL,
        author TEXT NOT NULL,
        code TEXT NOT NULL,
        explanation TEXT NOT NULL,
        files_edited INTEGER NOT NULL,
        combined TEXT NOT NULL,
        dims INTEGER NOT NULL,
        vector BLOB NOT NULL,
        code_cleanliness_rating REAL NOT NULL,
        created_at INTEGER NOT NULL
    )
"#;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn stored_dims(&self) -> Result<Option<usize>, StoreError> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM commit_records ORDER BY id LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.map(|d| d as usize))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_table(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_commit_records_sha ON commit_records(sha)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_table(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS commit_records")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_commit_records_sha ON commit_records(sha)")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, record: &CommitRecord) -> Result<i64, StoreError> {
        validate_vector(&record.vector)?;
        let dims = record.vector.len();
        let now = chrono::Utc::now().timestamp();

        // Single statement: the dimension check and the insert are atomic.
        let result = sqlx::query(
            r#"
            INSERT INTO commit_records (sha, author, code, explanation, files_edited,
                                        combined, dims, vector, code_cleanliness_rating, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM commit_records WHERE dims != ?)
            "#,
        )
        .bind(&record.sha)
        .bind(&record.author)
        .bind(&record.code)
        .bind(&record.explanation)
        .bind(record.files_edited as i64)
        .bind(&record.combined_text)
        .bind(dims as i64)
        .bind(vec_to_blob(&record.vector))
        .bind(record.cleanliness_rating)
        .bind(now)
        .bind(dims as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let expected = self.stored_dims().await?.unwrap_or(0);
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: dims,
            });
        }

        Ok(result.last_insert_rowid())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        validate_vector(query)?;

        let rows = sqlx::query(
            r#"
            SELECT id, sha, author, code, explanation, files_edited, combined,
                   vector, code_cleanliness_rating
            FROM commit_records
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let files_edited: i64 = row.get("files_edited");
                (
                    row.get::<i64, _>("id"),
                    CommitRecord {
                        sha: row.get("sha"),
                        author: row.get("author"),
                        code: row.get("code"),
                        explanation: row.get("explanation"),
                        files_edited: files_edited.max(0) as u64,
                        combined_text: row.get("combined"),
                        vector: blob_to_vec(&blob),
                        cleanliness_rating: row.get("code_cleanliness_rating"),
                    },
                )
            })
            .collect();

        rank(query, candidates, k)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commit_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn analytics(&self) -> Result<RepoAnalytics, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT author) AS num_authors,
                COUNT(*) AS num_commits,
                AVG(code_cleanliness_rating) AS mean_cleanliness
            FROM commit_records
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RepoAnalytics {
            num_authors: row.get("num_authors"),
            num_commits: row.get("num_commits"),
            mean_cleanliness: row.get("mean_cleanliness"),
        })
    }
}

//! Append-only log of answered questions.
//!
//! Every successful query appends its `(question, answer)` pair with a
//! millisecond timestamp. Timestamps never go backwards in log order, even
//! if the wall clock does: an append takes `max(now, latest timestamp)`.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::LogError;
use crate::models::QueryLogEntry;

#[async_trait]
pub trait QaLog: Send + Sync {
    async fn ensure_table(&self) -> Result<(), LogError>;

    async fn append(&self, question: &str, answer: &str) -> Result<QueryLogEntry, LogError>;

    /// Most recent entries first.
    async fn recent(&self, limit: i64) -> Result<Vec<QueryLogEntry>, LogError>;

    async fn count(&self) -> Result<i64, LogError>;
}

fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now)
}

pub struct SqliteQaLog {
    pool: SqlitePool,
}

impl SqliteQaLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QaLog for SqliteQaLog {
    async fn ensure_table(&self) -> Result<(), LogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS query_answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append(&self, question: &str, answer: &str) -> Result<QueryLogEntry, LogError> {
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query(
            r#"
            INSERT INTO query_answers (question, answer, timestamp)
            VALUES (?1, ?2, MAX(?3, COALESCE((SELECT MAX(timestamp) FROM query_answers), 0)))
            RETURNING id, timestamp
            "#,
        )
        .bind(question)
        .bind(answer)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        let ts: i64 = row.get("timestamp");
        tracing::debug!(id, "logged query-answer pair");

        Ok(QueryLogEntry {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: millis_to_utc(ts),
        })
    }

    async fn recent(&self, limit: i64) -> Result<Vec<QueryLogEntry>, LogError> {
        let rows = sqlx::query(
            "SELECT id, question, answer, timestamp FROM query_answers ORDER BY id DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| QueryLogEntry {
                id: row.get("id"),
                question: row.get("question"),
                answer: row.get("answer"),
                timestamp: millis_to_utc(row.get("timestamp")),
            })
            .collect())
    }

    async fn count(&self) -> Result<i64, LogError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM query_answers")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// In-memory log for tests and embedding.
#[derive(Default)]
pub struct InMemoryQaLog {
    entries: Mutex<Vec<QueryLogEntry>>,
}

impl InMemoryQaLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QaLog for InMemoryQaLog {
    async fn ensure_table(&self) -> Result<(), LogError> {
        Ok(())
    }

    async fn append(&self, question: &str, answer: &str) -> Result<QueryLogEntry, LogError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LogError::Unavailable("log lock poisoned".into()))?;

        let now = Utc::now();
        let timestamp = match entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        let entry = QueryLogEntry {
            id: entries.len() as i64 + 1,
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<QueryLogEntry>, LogError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| LogError::Unavailable("log lock poisoned".into()))?;
        Ok(entries
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64, LogError> {
        Ok(self.len() as i64)
    }
}

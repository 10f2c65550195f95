//! Repository analytics and Q&A history.
//!
//! `commit-rag stats` prints what has been ingested: distinct authors,
//! stored commit records and the mean cleanliness rating. `commit-rag
//! history` lists the most recent answered questions.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::migrate::run_migrations;
use crate::models::{QueryLogEntry, RepoAnalytics};
use crate::qa_log::{QaLog, SqliteQaLog};
use crate::store::{SqliteVectorStore, VectorStore};

async fn open(config: &Config) -> Result<(SqliteVectorStore, SqliteQaLog)> {
    let pool = db::connect(config).await?;
    let store = SqliteVectorStore::new(pool.clone());
    let log = SqliteQaLog::new(pool);
    run_migrations(&store, &log, false).await?;
    Ok((store, log))
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let (store, log) = open(config).await?;

    let analytics = store.analytics().await?;
    let answered = log.count().await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("commit-rag — Repository Stats");
    println!("=============================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    print_analytics(&analytics);
    println!("  Questions:     {}", answered);
    println!();

    Ok(())
}

fn print_analytics(analytics: &RepoAnalytics) {
    println!("  Authors:       {}", analytics.num_authors);
    println!("  Commits:       {}", analytics.num_commits);
    println!(
        "  Cleanliness:   {}",
        format_rating(analytics.mean_cleanliness)
    );
}

/// Run the history command: print the `limit` most recent Q&A pairs.
pub async fn run_history(config: &Config, limit: i64) -> Result<()> {
    let (_, log) = open(config).await?;

    let entries = log.recent(limit).await?;
    if entries.is_empty() {
        println!("No questions answered yet.");
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &QueryLogEntry) {
    println!(
        "#{}  {}",
        entry.id,
        format_ts_relative(entry.timestamp.timestamp())
    );
    println!("  Q: {}", entry.question);
    println!("  A: {}", first_line(&entry.answer));
    println!();
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// `"7.25 / 10"`, or `"n/a"` for an empty table.
pub fn format_rating(mean: Option<f64>) -> String {
    match mean {
        Some(m) => format!("{:.2} / 10", m),
        None => "n/a".to_string(),
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

//! CLI command runners.
//!
//! Each `run_*` function backs one `commit-rag` subcommand: it builds the
//! [`Services`] it needs, runs the library operation and prints a summary
//! to stdout. Diagnostics go through `tracing` to stderr.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::ingest::IngestReport;
use crate::services::Services;

pub async fn run_init(config: &Config, reset: bool) -> Result<()> {
    let services = Services::connect(config).await?;
    services.setup(reset).await?;
    if reset || config.store.reset_on_setup {
        println!("Database initialized; commit table reset.");
    } else {
        println!("Database initialized successfully.");
    }
    Ok(())
}

pub async fn run_analyze(
    config: &Config,
    owner: &str,
    repo: &str,
    limit: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let services = Services::connect(config).await?;
    let fetcher = services.fetcher()?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| services.artifact_path());
    let limit = limit.unwrap_or(config.github.default_limit);

    let report = services
        .pipeline()
        .run_analyze(&fetcher, owner, repo, limit, &output)
        .await
        .with_context(|| format!("analyze {}/{} failed", owner, repo))?;

    println!("analyze {}/{}", owner, repo);
    print_report(&report);
    Ok(())
}

pub async fn run_upsert(config: &Config, file: Option<&Path>) -> Result<()> {
    let services = Services::connect(config).await?;
    services.ensure_tables().await?;
    let path = file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| services.artifact_path());

    let report = services
        .pipeline()
        .run_upsert(&path)
        .await
        .with_context(|| format!("upsert from {} failed", path.display()))?;

    println!("upsert {}", path.display());
    print_report(&report);
    Ok(())
}

pub async fn run_ingest(
    config: &Config,
    owner: &str,
    repo: &str,
    limit: Option<usize>,
) -> Result<()> {
    let services = Services::connect(config).await?;
    let fetcher = services.fetcher()?;
    services.setup(false).await?;
    let limit = limit.unwrap_or(config.github.default_limit);

    let report = services
        .pipeline()
        .run_ingest(&fetcher, owner, repo, limit, &services.artifact_path())
        .await
        .with_context(|| format!("ingest {}/{} failed", owner, repo))?;

    println!("ingest {}/{}", owner, repo);
    print_report(&report);
    Ok(())
}

pub async fn run_ask(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    let services = Services::connect(config).await?;
    services.ensure_tables().await?;
    let engine = services.engine();

    let outcome = match top_k {
        Some(k) => engine.ask_with_top_k(question, k.max(1)).await?,
        None => engine.ask(question).await?,
    };

    println!("{}", outcome.answer);
    println!();
    println!("Sources:");
    if outcome.hits.is_empty() {
        println!("  (no stored commits)");
    }
    for hit in &outcome.hits {
        println!(
            "  {:.3}  {}  {}",
            hit.similarity, hit.record.sha, hit.record.author
        );
    }
    if let Some(err) = &outcome.log_error {
        println!();
        println!("warning: {}", err);
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    if report.commits_analyzed > 0 {
        println!("  commits analyzed: {}", report.commits_analyzed);
    }
    println!("  records upserted: {}", report.records_upserted);
    if let Some(path) = &report.artifact_path {
        println!("  artifact: {}", path.display());
    }
    println!("ok");
}

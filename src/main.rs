//! # commit-rag CLI
//!
//! Ingests a repository's recent commit history into a vector store and
//! answers natural-language questions about it.
//!
//! ## Usage
//!
//! ```bash
//! commit-rag --config ./config/commit-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `commit-rag init [--reset]` | Create tables; `--reset` drops stored commits |
//! | `commit-rag analyze --owner O --repo R` | Fetch and summarize commits into the artifact |
//! | `commit-rag upsert [FILE]` | Embed, rate and store every record of an artifact |
//! | `commit-rag ingest --owner O --repo R` | `analyze` then `upsert` |
//! | `commit-rag ask "<question>"` | Answer a question from stored commits |
//! | `commit-rag stats` | Authors, commits, mean cleanliness |
//! | `commit-rag history` | Recent questions and answers |
//! | `commit-rag serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commit_rag::{commands, config, server, services::Services, stats};

/// commit-rag: question answering over a repository's commit history.
#[derive(Parser)]
#[command(
    name = "commit-rag",
    about = "Ingest commit history into a vector store and ask questions about it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/commit-rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables.
    ///
    /// Idempotent unless `--reset` (or `[store] reset_on_setup`) is given,
    /// which drops every stored commit record.
    Init {
        #[arg(long)]
        reset: bool,
    },

    /// Fetch recent commits and write the analysis artifact.
    Analyze {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        /// Number of most recent commits (1-100).
        #[arg(long)]
        limit: Option<usize>,
        /// Artifact path; defaults to `[ingest] artifact_path`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Embed, rate and store every record in an artifact.
    ///
    /// Does not deduplicate: running twice on the same file stores every
    /// commit twice.
    Upsert {
        /// Artifact path; defaults to `[ingest] artifact_path`.
        file: Option<PathBuf>,
    },

    /// Run `analyze` and `upsert` back to back.
    Ingest {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ask a question about the stored commits.
    Ask {
        question: String,
        /// Number of commits given to the model as context.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show repository analytics.
    Stats,

    /// Show recent questions and answers.
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { reset } => {
            commands::run_init(&cfg, reset).await?;
        }
        Commands::Analyze {
            owner,
            repo,
            limit,
            output,
        } => {
            commands::run_analyze(&cfg, &owner, &repo, limit, output.as_deref()).await?;
        }
        Commands::Upsert { file } => {
            commands::run_upsert(&cfg, file.as_deref()).await?;
        }
        Commands::Ingest { owner, repo, limit } => {
            commands::run_ingest(&cfg, &owner, &repo, limit).await?;
        }
        Commands::Ask { question, top_k } => {
            commands::run_ask(&cfg, &question, top_k).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::History { limit } => {
            stats::run_history(&cfg, limit).await?;
        }
        Commands::Serve => {
            let services = Services::connect(&cfg).await?;
            server::run_server(services).await?;
        }
    }

    Ok(())
}

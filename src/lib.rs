//! # commit-rag
//!
//! Question answering over a repository's commit history.
//!
//! Recent commits are fetched from the GitHub REST API, their diffs are
//! summarized into plain text, and each commit becomes one embedded record
//! in a vector store. Questions are answered by retrieving the most similar
//! records and handing them to a completion model as context. Every answer
//! is appended to a Q&A log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  GitHub  │──▶│ Analyze  │──▶│ Artifact │──▶│    Upsert    │
//! │   API    │   │ (diffs)  │   │  (JSON)  │   │ embed + rate │
//! └──────────┘   └──────────┘   └──────────┘   └──────┬───────┘
//!                                                     ▼
//!                ┌──────────┐   ┌──────────┐   ┌──────────────┐
//!                │  Q&A Log │◀──│  Query   │◀──│ Vector Store │
//!                └──────────┘   │  Engine  │   │   (SQLite)   │
//!                               └──────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! commit-rag init
//! commit-rag ingest --owner rust-lang --repo cargo --limit 20
//! commit-rag ask "what changed in dependency resolution?"
//! commit-rag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`models`] | API, artifact and stored data types |
//! | [`error`] | Error taxonomy |
//! | [`github`] | Commit fetcher |
//! | [`diff_summary`] | Diff → text summarizer |
//! | [`record`] | Artifact records and combined text |
//! | [`embedding`] | Embedding providers and vector math |
//! | [`completion`] | Completion providers |
//! | [`rating`] | Code cleanliness rating |
//! | [`store`] | Vector store (SQLite and in-memory) |
//! | [`qa_log`] | Q&A log |
//! | [`ingest`] | Two-stage ingestion pipeline |
//! | [`query`] | Retrieval-augmented query engine |
//! | [`migrate`] | Table setup |
//! | [`services`] | Config → live components |
//! | [`server`] | HTTP API |
//! | [`stats`] | Analytics and history output |
//! | [`commands`] | CLI command runners |

pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod diff_summary;
pub mod embedding;
pub mod error;
pub mod github;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod qa_log;
pub mod query;
pub mod rating;
pub mod record;
pub mod server;
pub mod services;
pub mod stats;
pub mod store;

//! End-to-end tests of the library: ingestion against an in-process fake
//! GitHub API, querying, and the HTTP surface, all with stub providers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use commit_rag::completion::CompletionProvider;
use commit_rag::config::{Config, GithubConfig};
use commit_rag::db;
use commit_rag::embedding::EmbeddingProvider;
use commit_rag::error::{CompletionError, EmbeddingError, FetchError, IngestError};
use commit_rag::github::CommitFetcher;
use commit_rag::ingest::{read_artifact, IngestPipeline};
use commit_rag::migrate::run_migrations;
use commit_rag::qa_log::{QaLog, SqliteQaLog};
use commit_rag::query::QueryEngine;
use commit_rag::record::reconstruct_combined_text;
use commit_rag::server;
use commit_rag::services::Services;
use commit_rag::store::{SqliteVectorStore, VectorStore};

// ─── Stub providers ─────────────────────────────────────────────────

const DIMS: usize = 16;

/// Hashes words into a fixed number of buckets. Similar texts share buckets.
struct BagOfWords;

#[async_trait]
impl EmbeddingProvider for BagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0f32; DIMS];
        v[0] = 1.0;
        for word in text.split_whitespace() {
            let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31) + b as usize);
            v[1 + bucket % (DIMS - 1)] += 1.0;
        }
        Ok(v)
    }
}

/// Answers rating prompts with a fixed reply and everything else with a
/// canned answer, recording every prompt.
struct ScriptedModel {
    rating_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(rating_reply: &str) -> Self {
        Self {
            rating_reply: rating_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn question_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with("Given this information"))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedModel {
    async fn complete(&self, _model: &str, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.starts_with("Please rate") {
            Ok(self.rating_reply.clone())
        } else {
            Ok("Alice added a print statement.".to_string())
        }
    }
}

// ─── Fake GitHub API ────────────────────────────────────────────────

#[derive(Clone)]
struct FakeGithub {
    base: String,
    /// Listing calls seen for the `flaky` repo; the first one gets a 503.
    flaky_calls: Arc<AtomicUsize>,
}

async fn list_commits(
    State(gh): State<FakeGithub>,
    headers: HeaderMap,
    AxumPath((owner, repo)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-token") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
    }
    if repo == "flaky" && gh.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "try later"})));
    }
    let shas: &[&str] = match repo.as_str() {
        "broken" => &["c2", "missing"],
        "other" => &["o2", "o1"],
        _ => &["c2", "c1"],
    };
    let body: Vec<Value> = shas
        .iter()
        .map(|sha| {
            let author = if sha.ends_with('1') { "alice" } else { "bob" };
            json!({
                "sha": sha,
                "url": format!("{}/repos/{}/{}/commits/{}", gh.base, owner, repo, sha),
                "commit": {
                    "message": format!("commit {}", sha),
                    "author": {"name": author, "date": "2024-05-01T10:00:00Z"}
                }
            })
        })
        .collect();
    (StatusCode::OK, Json(Value::Array(body)))
}

async fn commit_detail(
    AxumPath((_owner, _repo, sha)): AxumPath<(String, String, String)>,
) -> impl IntoResponse {
    if sha == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "sha": sha,
            "files": [
                {
                    "filename": "src/main.py",
                    "status": "modified",
                    "additions": 1,
                    "deletions": 0,
                    "patch": "@@ -1 +1,2 @@\n+print('hello')"
                },
                {
                    "filename": "README.md",
                    "status": "added",
                    "additions": 3,
                    "deletions": 0
                }
            ]
        })),
    )
}

async fn spawn_fake_github() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base = format!("http://{}", addr);
    let app = Router::new()
        .route("/repos/{owner}/{repo}/commits", get(list_commits))
        .route("/repos/{owner}/{repo}/commits/{sha}", get(commit_detail))
        .with_state(FakeGithub {
            base: base.clone(),
            flaky_calls: Arc::new(AtomicUsize::new(0)),
        });
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    base
}

// ─── Fixtures ───────────────────────────────────────────────────────

struct Env {
    _tmp: TempDir,
    config: Config,
    store: Arc<SqliteVectorStore>,
    log: Arc<SqliteQaLog>,
    model: Arc<ScriptedModel>,
}

impl Env {
    async fn new(rating_reply: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_db_path(tmp.path().join("data/commits.sqlite"));
        config.ingest.artifact_path = tmp.path().join("data/app.json");
        let pool = db::connect(&config).await.unwrap();
        let store = Arc::new(SqliteVectorStore::new(pool.clone()));
        let log = Arc::new(SqliteQaLog::new(pool));
        run_migrations(store.as_ref(), log.as_ref(), false)
            .await
            .unwrap();
        Self {
            _tmp: tmp,
            config,
            store,
            log,
            model: Arc::new(ScriptedModel::new(rating_reply)),
        }
    }

    fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.config.clone(),
            Arc::new(BagOfWords),
            self.model.clone(),
            self.store.clone(),
        )
    }

    fn engine(&self) -> QueryEngine {
        QueryEngine::new(
            self.config.clone(),
            Arc::new(BagOfWords),
            self.model.clone(),
            self.store.clone(),
            self.log.clone(),
        )
    }

    fn services(&self) -> Services {
        Services {
            config: Arc::new(self.config.clone()),
            store: self.store.clone(),
            log: self.log.clone(),
            embedder: Arc::new(BagOfWords),
            completion: self.model.clone(),
        }
    }

    fn write_flat_artifact(&self) -> std::path::PathBuf {
        let path = self.config.ingest.artifact_path.clone();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[{"sha":"abc123","author":"alice","code":"print(1)","explanation":"add print","files edited":1}]"#,
        )
        .unwrap();
        path
    }
}

fn fetcher(base: &str) -> CommitFetcher {
    fetcher_with_retries(base, 0)
}

fn fetcher_with_retries(base: &str, max_retries: u32) -> CommitFetcher {
    let config = GithubConfig {
        api_base: base.to_string(),
        max_retries,
        ..GithubConfig::default()
    };
    CommitFetcher::with_token(&config, "test-token").unwrap()
}

// ─── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_flat_record_is_stored() {
    let env = Env::new("8").await;
    let path = env.write_flat_artifact();

    let report = env.pipeline().run_upsert(&path).await.unwrap();
    assert_eq!(report.records_upserted, 1);
    assert_eq!(env.store.count().await.unwrap(), 1);

    let query_vec = BagOfWords.embed("anything").await.unwrap();
    let hits = env.store.search(&query_vec, 5).await.unwrap();
    let record = &hits[0].record;
    assert_eq!(record.sha, "abc123");
    assert_eq!(record.files_edited, 1);
    assert!(!record.vector.is_empty());
    assert!((1.0..=10.0).contains(&record.cleanliness_rating));
    assert_eq!(record.cleanliness_rating, 8.0);
}

#[tokio::test]
async fn test_unparseable_rating_defaults_to_five() {
    let env = Env::new("it's quite tidy").await;
    let path = env.write_flat_artifact();
    env.pipeline().run_upsert(&path).await.unwrap();

    let analytics = env.store.analytics().await.unwrap();
    assert_eq!(analytics.mean_cleanliness, Some(5.0));
}

#[tokio::test]
async fn test_double_upsert_duplicates_records() {
    let env = Env::new("7").await;
    let path = env.write_flat_artifact();

    env.pipeline().run_upsert(&path).await.unwrap();
    env.pipeline().run_upsert(&path).await.unwrap();

    let query_vec = BagOfWords.embed("abc123").await.unwrap();
    let hits = env.store.search(&query_vec, 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.record.sha == "abc123"));
}

#[tokio::test]
async fn test_stored_combined_text_round_trips() {
    let env = Env::new("7").await;
    let path = env.write_flat_artifact();
    env.pipeline().run_upsert(&path).await.unwrap();

    let query_vec = BagOfWords.embed("x").await.unwrap();
    let hits = env.store.search(&query_vec, 1).await.unwrap();
    let record = &hits[0].record;
    assert_eq!(reconstruct_combined_text(record), record.combined_text);
    assert_eq!(
        record.combined_text,
        "The author is: alice\nHere is the code: print(1)\nExplanation:\nadd print\nSHA: abc123\nFiles edited: 1"
    );
}

#[tokio::test]
async fn test_ingest_from_fake_github() {
    let base = spawn_fake_github().await;
    let env = Env::new("6").await;

    let report = env
        .pipeline()
        .run_ingest(&fetcher(&base), "octo", "good", 10, &env.config.ingest.artifact_path)
        .await
        .unwrap();
    assert_eq!(report.commits_analyzed, 2);
    assert_eq!(report.records_upserted, 2);

    // Artifact keeps list order: most recent first.
    let artifact = read_artifact(&env.config.ingest.artifact_path).unwrap();
    assert_eq!(artifact[0].sha.as_deref(), Some("c2"));
    assert_eq!(artifact[1].author.as_deref(), Some("alice"));
    let analysis = artifact[1].analysis.as_deref().unwrap();
    assert!(analysis.starts_with("Summary: Modified 2 files with 4 additions and 0 deletions."));
    assert!(analysis.contains("Added: print('hello')"));
    assert!(analysis.contains("Added new file 'README.md'"));

    let analytics = env.store.analytics().await.unwrap();
    assert_eq!(analytics.num_commits, 2);
    assert_eq!(analytics.num_authors, 2);
}

#[tokio::test]
async fn test_detail_404_aborts_without_writing() {
    let base = spawn_fake_github().await;
    let env = Env::new("6").await;

    let err = env
        .pipeline()
        .run_ingest(&fetcher(&base), "octo", "broken", 10, &env.config.ingest.artifact_path)
        .await
        .unwrap_err();

    assert!(
        matches!(err, IngestError::Fetch(FetchError::Status { status: 404, .. })),
        "unexpected error: {}",
        err
    );
    assert_eq!(env.store.count().await.unwrap(), 0);
    assert!(!env.config.ingest.artifact_path.exists());
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let base = spawn_fake_github().await;
    let config = GithubConfig {
        api_base: base,
        max_retries: 0,
        ..GithubConfig::default()
    };
    let fetcher = CommitFetcher::with_token(&config, "wrong").unwrap();
    let err = fetcher.fetch_commits("octo", "good", 5).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_transient_503_is_retried() {
    let base = spawn_fake_github().await;
    let commits = fetcher_with_retries(&base, 1)
        .fetch_commits("octo", "flaky", 5)
        .await
        .unwrap();
    let shas: Vec<&str> = commits.iter().map(|c| c.sha.as_str()).collect();
    assert_eq!(shas, vec!["c2", "c1"]);
}

#[tokio::test]
async fn test_503_without_retries_fails() {
    let base = spawn_fake_github().await;
    let err = fetcher(&base)
        .fetch_commits("octo", "flaky", 5)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingests_keep_their_own_commits() {
    let base = spawn_fake_github().await;
    let env = Env::new("6").await;
    let shared = env.config.ingest.artifact_path.clone();
    let rounds = 10;

    for _ in 0..rounds {
        let good_fetcher = fetcher(&base);
        let other_fetcher = fetcher(&base);
        let good_pipeline = env.pipeline();
        let other_pipeline = env.pipeline();
        let (good, other) = tokio::join!(
            good_pipeline.run_ingest(&good_fetcher, "octo", "good", 10, &shared),
            other_pipeline.run_ingest(&other_fetcher, "octo", "other", 10, &shared),
        );
        assert_eq!(good.unwrap().records_upserted, 2);
        assert_eq!(other.unwrap().records_upserted, 2);
    }

    let query_vec = BagOfWords.embed("anything").await.unwrap();
    let hits = env.store.search(&query_vec, 1000).await.unwrap();
    let from_good = hits.iter().filter(|h| h.record.sha.starts_with('c')).count();
    let from_other = hits.iter().filter(|h| h.record.sha.starts_with('o')).count();
    assert_eq!(from_good, 2 * rounds);
    assert_eq!(from_other, 2 * rounds);

    // The shared artifact holds exactly one complete batch.
    let artifact = read_artifact(&shared).unwrap();
    let shas: Vec<&str> = artifact.iter().filter_map(|r| r.sha.as_deref()).collect();
    assert!(shas == ["c2", "c1"] || shas == ["o2", "o1"], "{:?}", shas);
}

// ─── Query ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_question_is_answered_and_logged() {
    let env = Env::new("7").await;
    let path = env.write_flat_artifact();
    env.pipeline().run_upsert(&path).await.unwrap();

    let outcome = env.engine().ask("what did alice do?").await.unwrap();
    assert_eq!(outcome.hits.len(), 1);
    assert!(!outcome.answer.is_empty());
    assert!(outcome.log_error.is_none());

    let prompts = env.model.question_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("add print"));
    assert!(prompts[0].contains("User question: what did alice do?"));

    let history = env.log.recent(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, "what did alice do?");
    assert_eq!(history[0].answer, outcome.answer);
}

#[tokio::test]
async fn test_query_on_empty_store_still_answers() {
    let env = Env::new("7").await;
    let outcome = env.engine().ask("anything here?").await.unwrap();
    assert!(outcome.hits.is_empty());
    assert!(env.model.question_prompts()[0]
        .starts_with("Given this information about some code commits:\n\n\n\nUser question:"));
}

#[tokio::test]
async fn test_search_results_are_deterministic() {
    let env = Env::new("7").await;
    let path = env.write_flat_artifact();
    for _ in 0..4 {
        env.pipeline().run_upsert(&path).await.unwrap();
    }

    let query_vec = BagOfWords.embed("alice print").await.unwrap();
    let first = env.store.search(&query_vec, 3).await.unwrap();
    let second = env.store.search(&query_vec, 3).await.unwrap();
    assert_eq!(first.len(), 3);
    let ids = |hits: &[commit_rag::models::SearchHit]| hits.iter().map(|h| h.id).collect::<Vec<_>>();
    assert_eq!(ids(&first[..]), ids(&second[..]));
    assert!(first.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

// ─── HTTP API ───────────────────────────────────────────────────────

async fn spawn_api(services: Services) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(services);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_query_stats_and_errors() {
    let env = Env::new("9").await;
    let path = env.write_flat_artifact();
    env.pipeline().run_upsert(&path).await.unwrap();
    let base = spawn_api(env.services()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let resp = client
        .post(format!("{}/query", base))
        .json(&json!({"question": "what did alice do?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["shas"], json!(["abc123"]));
    assert_eq!(body["answer"], "Alice added a print statement.");

    let resp = client
        .post(format!("{}/query", base))
        .json(&json!({"question": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let stats: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["num_commits"], 1);
    assert_eq!(stats["num_authors"], 1);
    assert_eq!(stats["mean_cleanliness"], 9.0);
    assert_eq!(stats["questions_answered"], 1);

    let history: Value = client
        .get(format!("{}/history?limit=5", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

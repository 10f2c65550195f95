//! JSON HTTP API.
//!
//! Exposes ingestion, question answering and analytics for a browser
//! dashboard or other clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyze` | Fetch, analyze and upsert a repository's recent commits |
//! | `POST` | `/query` | Answer a question from stored commits |
//! | `GET`  | `/stats` | Authors, commit count, mean cleanliness, questions answered |
//! | `GET`  | `/history` | Most recent Q&A pairs (`?limit=`, default 20) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `completion_disabled` (400), `upstream_error` (502), `timeout` (408),
//! `internal` (500).
//!
//! # CORS
//!
//! Origins listed in `[server].cors_origins` are allowed; an empty list
//! allows any origin.

use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ServerConfig;
use crate::error::{CompletionError, EmbeddingError, IngestError, QueryError};
use crate::ingest::IngestReport;
use crate::models::{QueryLogEntry, RepoAnalytics};
use crate::services::Services;

/// Start the server on `[server].bind` and run until the process exits.
pub async fn run_server(services: Services) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    services.ensure_tables().await?;

    let app = router(services);

    tracing::info!(addr = %bind_addr, "server listening");
    println!("commit-rag server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full route table with CORS applied.
pub fn router(services: Services) -> Router {
    let cors = cors_layer(&services.config.server);
    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/query", post(handle_query))
        .route("/stats", get(handle_stats))
        .route("/history", get(handle_history))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(services)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let msg = err.to_string();
        match err {
            QueryError::EmptyQuestion => AppError::new(StatusCode::BAD_REQUEST, "bad_request", msg),
            QueryError::Embedding(EmbeddingError::Disabled) => {
                AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", msg)
            }
            QueryError::Completion(CompletionError::Disabled) => {
                AppError::new(StatusCode::BAD_REQUEST, "completion_disabled", msg)
            }
            QueryError::Timeout(_) => AppError::new(StatusCode::REQUEST_TIMEOUT, "timeout", msg),
            _ => internal(msg),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let msg = err.to_string();
        match err {
            IngestError::Fetch(_) => AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", msg),
            IngestError::Embedding {
                source: EmbeddingError::Disabled,
                ..
            } => AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", msg),
            IngestError::Timeout(_) => AppError::new(StatusCode::REQUEST_TIMEOUT, "timeout", msg),
            _ => internal(msg),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    owner: String,
    repo: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Runs both ingestion stages. Each request writes its own artifact next to
/// `[ingest].artifact_path`.
async fn handle_analyze(
    State(services): State<Services>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<IngestReport>, AppError> {
    if req.owner.trim().is_empty() || req.repo.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "owner and repo must not be empty",
        ));
    }

    let fetcher = services.fetcher().map_err(|e| internal(e.to_string()))?;
    services
        .setup(false)
        .await
        .map_err(|e| internal(e.to_string()))?;

    let limit = req.limit.unwrap_or(services.config.github.default_limit);
    let report = services
        .pipeline()
        .run_ingest(
            &fetcher,
            &req.owner,
            &req.repo,
            limit,
            &services.request_artifact_path(&req.owner, &req.repo),
        )
        .await?;

    Ok(Json(report))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    shas: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_error: Option<String>,
}

async fn handle_query(
    State(services): State<Services>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let outcome = services.engine().ask(&req.question).await?;
    Ok(Json(QueryResponse {
        shas: outcome.shas().into_iter().map(str::to_string).collect(),
        answer: outcome.answer,
        log_error: outcome.log_error,
    }))
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    analytics: RepoAnalytics,
    questions_answered: i64,
}

async fn handle_stats(State(services): State<Services>) -> Result<Json<StatsResponse>, AppError> {
    let analytics = services
        .store
        .analytics()
        .await
        .map_err(|e| internal(e.to_string()))?;
    let questions_answered = services
        .log
        .count()
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(StatsResponse {
        analytics,
        questions_answered,
    }))
}

// ============ GET /history ============

#[derive(Deserialize)]
struct HistoryParams {
    #[serde(default = "default_history_limit")]
    limit: i64,
}

fn default_history_limit() -> i64 {
    20
}

async fn handle_history(
    State(services): State<Services>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<QueryLogEntry>>, AppError> {
    let entries = services
        .log
        .recent(params.limit)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(entries))
}

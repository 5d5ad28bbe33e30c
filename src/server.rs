//! HTTP job-submission and status-polling server.
//!
//! Submissions return immediately with a PENDING job; clients poll the
//! status endpoint until `complete` is true and then follow
//! `redirect_url` (or fetch the job directly).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyses` | Submit `{text, origin?}`; 202 with the job snapshot |
//! | `GET`  | `/analyses` | Recent jobs (`?page=`, 1-based, and `?limit=`, default 20) and job statistics |
//! | `GET`  | `/analyses/{id}` | Full job snapshot |
//! | `DELETE` | `/analyses/{id}` | Remove a job; returns its last snapshot |
//! | `GET`  | `/analyses/{id}/status` | `{complete, state, status?, redirect_url?, error?}` |
//! | `POST` | `/dataset/reload` | Re-read the config file and dataset; swap if the version changed |
//! | `GET`  | `/health` | Health check with crate and dataset version |
//!
//! # Dataset reload
//!
//! `POST /dataset/reload` re-reads the config file the server was started
//! with, then the dataset it names. When the resulting version differs from
//! the current one the pipeline switches to it and purges the old cache
//! entries; otherwise nothing changes and `reloaded` is false. An unversioned
//! dataset gets a new version whenever its file changes; a configured
//! `[dataset].version` must be bumped in the config file.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no analysis with id ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500,
//! including a reload whose config or dataset cannot be loaded).
//! A job that fails analysis is not an HTTP error: it is reported as a
//! FAILED job with its own `error` descriptor.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can poll directly.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use annex_guard_core::models::JobStatusView;
use annex_guard_core::pipeline::JobStats;
use annex_guard_core::{AnalysisJob, AnalysisPipeline, DatasetSnapshot};

use crate::config::{self, Config};
use crate::{dataset, engine};

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: AnalysisPipeline,
    /// Config file re-read by `POST /dataset/reload`.
    config_path: Arc<PathBuf>,
}

/// Starts the server for the `annexg serve` command.
///
/// Loads the dataset, builds the pipeline, and binds to `[server].bind`.
/// `config_path` is the file `config` was loaded from. Runs until Ctrl-C.
pub async fn run_server(config_path: &std::path::Path, config: &Config) -> anyhow::Result<()> {
    let pipeline = engine::build_pipeline(config)?;
    run_server_with_pipeline(pipeline, config_path.to_path_buf(), &config.server.bind).await
}

/// Serves an existing pipeline on `bind_addr`.
pub async fn run_server_with_pipeline(
    pipeline: AnalysisPipeline,
    config_path: PathBuf,
    bind_addr: &str,
) -> anyhow::Result<()> {
    let version = pipeline.dataset_version();
    let app = router(pipeline, config_path);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(bind = %bind_addr, dataset = %version, "annexg server listening");
    println!("Annex Guard server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// All routes with CORS applied.
pub fn router(pipeline: AnalysisPipeline, config_path: PathBuf) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/analyses", get(handle_history).post(handle_submit))
        .route("/analyses/{id}", get(handle_get).delete(handle_delete))
        .route("/analyses/{id}/status", get(handle_status))
        .route("/dataset/reload", post(handle_reload))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState {
            pipeline,
            config_path: Arc::new(config_path),
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
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

/// Error type that converts into the JSON error envelope.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| bad_request(format!("invalid analysis id: {}", raw)))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    dataset_version: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dataset_version: state.pipeline.dataset_version().to_string(),
    })
}

// ============ POST /analyses ============

#[derive(Deserialize)]
struct SubmitRequest {
    text: String,
    #[serde(default = "default_origin")]
    origin: String,
}

fn default_origin() -> String {
    "text".to_string()
}

/// Creates a job and returns it while still PENDING.
///
/// Empty or malformed lists are accepted here and reported by the job
/// itself; only an unreadable request body is a 400.
async fn handle_submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AnalysisJob>), AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let job = state.pipeline.submit(req.text, req.origin);
    tracing::info!(job = %job.id, "analysis submitted");
    Ok((StatusCode::ACCEPTED, Json(job)))
}

// ============ GET /analyses ============

#[derive(Deserialize)]
struct HistoryParams {
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryResponse {
    page: usize,
    limit: usize,
    jobs: Vec<AnalysisJob>,
    stats: JobStats,
}

async fn handle_history(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(bad_request("limit must be >= 1"));
    }
    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(bad_request("page must be >= 1"));
    }
    let offset = (page - 1).saturating_mul(limit);
    Ok(Json(HistoryResponse {
        page,
        limit,
        jobs: state.pipeline.history(offset, limit),
        stats: state.pipeline.stats(),
    }))
}

// ============ GET /analyses/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisJob>, AppError> {
    let id = parse_id(&id)?;
    state
        .pipeline
        .poll(id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no analysis with id {}", id)))
}

// ============ DELETE /analyses/{id} ============

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisJob>, AppError> {
    let id = parse_id(&id)?;
    state
        .pipeline
        .delete(id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no analysis with id {}", id)))
}

// ============ GET /analyses/{id}/status ============

async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusView>, AppError> {
    let id = parse_id(&id)?;
    let view = state
        .pipeline
        .status(id)
        .ok_or_else(|| not_found(format!("no analysis with id {}", id)))?;
    if view.complete && view.redirect_url.is_none() {
        return Err(internal(format!("analysis {} is complete without a result", id)));
    }
    Ok(Json(view))
}

// ============ POST /dataset/reload ============

#[derive(Serialize)]
struct ReloadResponse {
    reloaded: bool,
    previous_version: String,
    dataset_version: String,
    entries: usize,
    cache_entries_removed: usize,
}

/// Re-reads the config file and dataset off the async workers, then swaps
/// the pipeline to the new version if it changed.
async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let path = Arc::clone(&state.config_path);
    let snapshot = tokio::task::spawn_blocking(move || -> anyhow::Result<DatasetSnapshot> {
        let config = config::load_config(&path)?;
        dataset::load_snapshot(&config)
    })
    .await
    .map_err(|e| internal(format!("dataset reload task failed: {}", e)))?
    .map_err(|e| internal(format!("dataset reload failed: {:#}", e)))?;

    let previous = state.pipeline.dataset_version();
    let entries = snapshot.index.len();
    if snapshot.version() == &previous {
        tracing::info!(version = %previous, "dataset unchanged, reload skipped");
        return Ok(Json(ReloadResponse {
            reloaded: false,
            previous_version: previous.to_string(),
            dataset_version: previous.to_string(),
            entries,
            cache_entries_removed: 0,
        }));
    }

    let next = snapshot.version().clone();
    let removed = state.pipeline.reload_dataset(snapshot).await;
    Ok(Json(ReloadResponse {
        reloaded: true,
        previous_version: previous.to_string(),
        dataset_version: next.to_string(),
        entries,
        cache_entries_removed: removed,
    }))
}

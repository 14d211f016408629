//! HTTP API for the experiment catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/search?q=&mode=&limit=&vectorWeight=` | Keyword, vector, or hybrid search |
//! | `GET`  | `/api/experiments?page=&limit=` | Paginated catalog, newest first |
//! | `GET`  | `/api/experiments/{id}` | One experiment |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Unknown search mode: fuzzy. ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `unavailable` (503), `internal` (500).
//!
//! A search that silently lost its vector path still answers 200; the
//! `mode` and `fallback` fields of the response say what actually ran.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cro_search_core::{
    ExperimentRecord, RetrievalMode, SearchEngine, SearchError, SearchOutcome, SearchRequest,
};

use crate::config::Config;
use crate::db;
use crate::experiments::{self, ExperimentPage, DEFAULT_PAGE_SIZE};
use crate::search::build_engine;
use crate::sqlite_store::SqliteStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<SearchEngine>,
    store: Arc<SqliteStore>,
}

impl AppState {
    pub fn new(engine: SearchEngine, store: SqliteStore) -> Self {
        Self {
            engine: Arc::new(engine),
            store: Arc::new(store),
        }
    }
}

/// Build the application router. Exposed separately from [`run_server`]
/// so tests can drive it in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/search", get(handle_search))
        .route("/api/experiments", get(handle_list))
        .route("/api/experiments/{id}", get(handle_get))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let engine = build_engine(config, pool.clone())?;
    let state = AppState::new(engine, SqliteStore::new(pool));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        provider = %config.embedding.provider,
        "server listening"
    );
    axum::serve(listener, router(state)).await?;

    Ok(())
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

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        tracing::error!(error = %err, "search failed");
        AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "unavailable",
            message: err.to_string(),
        }
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Numeric parameters arrive as strings so that malformed values can be
/// ignored instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    q: Option<String>,
    mode: Option<String>,
    limit: Option<String>,
    vector_weight: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchOutcome>, AppError> {
    let mode = match params.mode.as_deref() {
        Some(m) if !m.trim().is_empty() => {
            m.parse::<RetrievalMode>().map_err(|e| bad_request(e.to_string()))?
        }
        _ => RetrievalMode::default(),
    };

    let request = SearchRequest {
        query: params.q.unwrap_or_default(),
        limit: params.limit.and_then(|l| l.trim().parse().ok()),
        mode,
        vector_weight: params.vector_weight.and_then(|w| w.trim().parse().ok()),
    };

    let outcome = state.engine.search(&request).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ExperimentPage>, AppError> {
    let page = params.page.and_then(|p| p.trim().parse().ok()).unwrap_or(1);
    let limit = params
        .limit
        .and_then(|l| l.trim().parse().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let page = experiments::list_page(&state.store, page, limit)
        .await
        .map_err(internal)?;
    Ok(Json(page))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExperimentRecord>, AppError> {
    match state.store.get_experiment(&id).await.map_err(internal)? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found("Experiment not found")),
    }
}

//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service discovery: name, status, endpoints, version |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/fetch-repo` | Harvest a GitHub repository and index it |
//! | `POST` | `/search` | Natural-language search over indexed files |
//!
//! # Error Contract
//!
//! Every error response has the same shape:
//!
//! ```json
//! { "error": { "code": "invalid_query", "message": "Invalid query: query must not be empty" } }
//! ```
//!
//! Codes and statuses come from [`HarvestError::code`] and
//! [`HarvestError::status_code`]; a body that does not deserialize is
//! rejected with `bad_request` (400).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::HarvestError;
use crate::fetch::fetch_repository;
use crate::github::GitHubClient;
use crate::ingest::Ingestor;
use crate::models::{HarvestReport, SearchFilters, SearchResult};
use crate::search::search;
use crate::traits::{RepoSource, SearchBackend};
use crate::vectara::VectaraClient;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    /// Absent when no GitHub token is configured.
    source: Option<Arc<dyn RepoSource>>,
    /// Absent when Vectara credentials are incomplete.
    backend: Option<Arc<dyn SearchBackend>>,
    ingestor: Option<Arc<Ingestor>>,
}

impl AppState {
    /// Wire explicit collaborators. Used by tests and by [`AppState::from_config`].
    pub fn new(
        config: Config,
        source: Option<Arc<dyn RepoSource>>,
        backend: Option<Arc<dyn SearchBackend>>,
    ) -> Self {
        let ingestor = backend
            .clone()
            .map(|backend| Arc::new(Ingestor::new(backend, &config)));
        Self {
            config: Arc::new(config),
            source,
            backend,
            ingestor,
        }
    }

    /// Build the real GitHub and Vectara clients from whatever credentials
    /// the configuration carries.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source: Option<Arc<dyn RepoSource>> = match &config.credentials.github_token {
            Some(token) => Some(Arc::new(GitHubClient::new(&config.github, token.clone())?)),
            None => None,
        };
        let backend: Option<Arc<dyn SearchBackend>> = match &config.credentials.vectara {
            Some(creds) => Some(Arc::new(VectaraClient::new(&config.vectara, creds.clone())?)),
            None => None,
        };
        Ok(Self::new(config.clone(), source, backend))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/fetch-repo", post(handle_fetch_repo))
        .route("/search", post(handle_search))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Logs method, URI, status and duration of every request.
async fn log_request(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    if status.is_success() {
        tracing::info!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "Request completed"
        );
    } else {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "Request failed"
        );
    }

    response
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

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for HarvestError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.code(), self.to_string())
    }
}

fn bad_request(rejection: JsonRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: String,
    status: String,
    endpoints: Vec<String>,
    version: String,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "repo-harvest: GitHub repository ingestion and search".to_string(),
        status: "running".to_string(),
        endpoints: ["/", "/health", "/fetch-repo", "/search"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
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

// ============ POST /fetch-repo ============

#[derive(Deserialize)]
struct FetchRepoRequest {
    repo_url: String,
}

async fn handle_fetch_repo(
    State(state): State<AppState>,
    body: Result<Json<FetchRepoRequest>, JsonRejection>,
) -> Result<Json<HarvestReport>, Response> {
    let Json(req) = body.map_err(bad_request)?;
    let start = Instant::now();

    let result = fetch_repository(
        state.source.as_deref(),
        state.ingestor.as_deref(),
        &req.repo_url,
    )
    .await;

    match result {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            tracing::error!(
                repo_url = %req.repo_url,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Repository fetch failed"
            );
            Err(e.into_response())
        }
    }
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    owner: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, Response> {
    let Json(req) = body.map_err(bad_request)?;
    let start = Instant::now();

    let filters = SearchFilters {
        repo: req.repo,
        owner: req.owner,
    };
    let result = search(
        state.backend.as_deref(),
        &state.config.search,
        &req.query,
        req.limit,
        &filters,
    )
    .await;

    match result {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!(
                query = %req.query,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Search failed"
            );
            Err(e.into_response())
        }
    }
}

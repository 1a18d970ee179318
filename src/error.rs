//! Error taxonomy for harvesting, ingestion and search.
//!
//! Every failure that can reach an HTTP caller is a [`HarvestError`]. Each
//! variant carries its own status code and machine-readable code so the
//! server can render the JSON error contract without string matching.
//!
//! Partial ingestion failure has no variant: failed uploads are counted in
//! [`IngestionOutcome::failed`](crate::models::IngestionOutcome) instead.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Error, Debug)]
pub enum HarvestError {
    /// The repository URL did not match any accepted GitHub form.
    #[error("Invalid GitHub URL format: {0}. Expected format: https://github.com/owner/repo")]
    InvalidReference(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The repository or a path inside it does not exist.
    #[error("Repository not found or path does not exist: {0}")]
    NotFound(String),

    /// GitHub answered 403/429: quota exhausted or token lacks access.
    #[error("GitHub API rate limit exceeded or insufficient permissions: {0}")]
    RateLimited(String),

    #[error("GitHub API unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Transport failure or 5xx/429 from the search backend. Retryable.
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The search backend refused the request with a non-retryable status.
    #[error("Search backend rejected request ({status}): {message}")]
    BackendRejected { status: u16, message: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl HarvestError {
    /// HTTP status used when this error is returned to a caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HarvestError::InvalidReference(_) | HarvestError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            HarvestError::NotFound(_) => StatusCode::NOT_FOUND,
            HarvestError::RateLimited(_) => StatusCode::FORBIDDEN,
            HarvestError::UpstreamUnavailable(_)
            | HarvestError::BackendUnavailable(_)
            | HarvestError::BackendRejected { .. }
            | HarvestError::MissingCredentials(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            HarvestError::InvalidReference(_) => "invalid_reference",
            HarvestError::InvalidQuery(_) => "invalid_query",
            HarvestError::NotFound(_) => "not_found",
            HarvestError::RateLimited(_) => "rate_limited",
            HarvestError::UpstreamUnavailable(_) => "upstream_unavailable",
            HarvestError::BackendUnavailable(_) => "backend_unavailable",
            HarvestError::BackendRejected { .. } => "backend_rejected",
            HarvestError::MissingCredentials(_) => "missing_credentials",
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Only backend-side transient failures qualify; GitHub calls are never
    /// retried and caller input errors never change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, HarvestError::BackendUnavailable(_))
    }
}

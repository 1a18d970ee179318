//! Seams to the two remote services.
//!
//! The walker, ingestor and searcher only ever talk to these traits, so the
//! HTTP clients in [`github`](crate::github) and [`vectara`](crate::vectara)
//! can be swapped for in-memory fakes in tests or for other hosts/backends.
//!
//! ```text
//!   parse_github_url ─▶ traverse ──▶ RepoSource ───▶ GitHub contents API
//!                          │
//!                          ▼
//!                       Ingestor ──▶ SearchBackend ─▶ Vectara documents API
//!   Searcher ───────────────────────▶ SearchBackend ─▶ Vectara query API
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::RepositoryReference;

// ═══════════════════════════════════════════════════════════════════════
// Repository listing
// ═══════════════════════════════════════════════════════════════════════

/// Kind of a directory listing item, as reported by the hosting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One item of a directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RemoteKind,
    #[serde(default)]
    pub size: u64,
}

/// A single file as returned by the hosting API, still encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteFile {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Read access to a remote repository's file tree.
///
/// Implementations report failures as
/// [`NotFound`](crate::error::HarvestError::NotFound),
/// [`RateLimited`](crate::error::HarvestError::RateLimited) or
/// [`UpstreamUnavailable`](crate::error::HarvestError::UpstreamUnavailable).
/// Callers do not retry.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// List the items directly under `path` (`""` is the repository root),
    /// in the order the host returns them.
    async fn list_directory(
        &self,
        repo: &RepositoryReference,
        path: &str,
    ) -> Result<Vec<RemoteEntry>>;

    /// Fetch one file with its encoded content.
    async fn fetch_file(&self, repo: &RepositoryReference, path: &str) -> Result<RemoteFile>;
}

// ═══════════════════════════════════════════════════════════════════════
// Search backend
// ═══════════════════════════════════════════════════════════════════════

/// A document to index: one text part plus two metadata levels.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Stable identifier, `owner/name/path`.
    pub id: String,
    pub text: String,
    /// Repository-level fields: `repo`, `owner`, `source`.
    pub document_metadata: BTreeMap<String, String>,
    /// File-level fields: `path`, `file_name`, `file_type`, `size`.
    pub part_metadata: BTreeMap<String, String>,
}

/// A combined retrieval + summarization request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    /// Already clamped by the caller.
    pub limit: u32,
}

/// Raw query response. Hits stay untyped here; the searcher validates each
/// one separately so a single malformed hit cannot fail the whole query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub search_results: Vec<serde_json::Value>,
}

/// Index and query surface of the semantic-search backend.
///
/// Transient failures must be reported as
/// [`BackendUnavailable`](crate::error::HarvestError::BackendUnavailable)
/// so the ingestor's retry predicate can recognize them.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create or replace a document.
    async fn upsert_document(&self, document: &IndexDocument) -> Result<()>;

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;
}

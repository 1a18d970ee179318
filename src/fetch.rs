//! Repository harvest: parse → traverse → (optionally) ingest.

use anyhow::Result as AnyResult;

use crate::error::{HarvestError, Result};
use crate::ingest::Ingestor;
use crate::models::HarvestReport;
use crate::repo_url::parse_github_url;
use crate::traits::RepoSource;
use crate::walker::traverse;

/// Harvest the repository at `repo_url`.
///
/// The URL is checked before credentials, so a malformed URL is reported as
/// such even when no GitHub token is configured. Without an `ingestor` the
/// files are returned without indexing and `vectara_ingestion` is omitted.
pub async fn fetch_repository(
    source: Option<&dyn RepoSource>,
    ingestor: Option<&Ingestor>,
    repo_url: &str,
) -> Result<HarvestReport> {
    let repo = parse_github_url(repo_url)?;
    let source = source.ok_or_else(|| {
        HarvestError::MissingCredentials(format!(
            "{} is not set; cannot read from GitHub",
            crate::config::GITHUB_TOKEN_VAR
        ))
    })?;

    tracing::info!(repo = %repo, "Harvesting repository");
    let files = traverse(source, &repo).await?;

    let vectara_ingestion = match ingestor {
        Some(ingestor) => Some(ingestor.ingest(&files, &repo).await),
        None => {
            tracing::warn!(repo = %repo, "Search backend not configured; skipping ingestion");
            None
        }
    };

    Ok(HarvestReport {
        owner: repo.owner,
        repo: repo.name,
        total_files: files.len(),
        files,
        vectara_ingestion,
    })
}

/// CLI entry point for `harvest fetch`.
pub async fn run_fetch(
    source: Option<&dyn RepoSource>,
    ingestor: Option<&Ingestor>,
    repo_url: &str,
    json: bool,
) -> AnyResult<()> {
    let report = fetch_repository(source, ingestor, repo_url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("fetch {}/{}", report.owner, report.repo);
    println!("  files: {}", report.total_files);
    println!();

    for file in &report.files {
        let status = if file.skipped { " (skipped)" } else { "" };
        println!("  {} [{} bytes]{}", file.path, file.size, status);
    }

    println!();
    println!("files by extension:");
    for (ext, count) in report.files_by_extension() {
        println!("  {:<16} {}", ext, count);
    }

    if let Some(outcome) = report.vectara_ingestion {
        println!();
        println!("ingestion:");
        println!("  ingested: {}", outcome.ingested);
        println!("  skipped: {}", outcome.skipped);
        println!("  failed: {}", outcome.failed);
        if outcome.has_failures() {
            println!("partial");
            return Ok(());
        }
    }
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::RepositoryReference;
    use crate::traits::{
        IndexDocument, QueryRequest, QueryResponse, RemoteEntry, RemoteFile, RemoteKind,
        SearchBackend,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct OneFileRepo;

    #[async_trait]
    impl RepoSource for OneFileRepo {
        async fn list_directory(
            &self,
            repo: &RepositoryReference,
            _path: &str,
        ) -> Result<Vec<RemoteEntry>> {
            if repo.name != "hello" {
                return Err(HarvestError::NotFound(repo.to_string()));
            }
            Ok(vec![RemoteEntry {
                path: "README".to_string(),
                name: "README".to_string(),
                kind: RemoteKind::File,
                size: 5,
            }])
        }

        async fn fetch_file(&self, _repo: &RepositoryReference, path: &str) -> Result<RemoteFile> {
            Ok(RemoteFile {
                path: path.to_string(),
                name: path.to_string(),
                size: 5,
                content: Some("hello from the readme".to_string()),
                encoding: None,
            })
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        upserts: AtomicUsize,
    }

    #[async_trait]
    impl SearchBackend for CountingBackend {
        async fn upsert_document(&self, _document: &IndexDocument) -> Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn query(&self, _request: &QueryRequest) -> Result<QueryResponse> {
            Ok(QueryResponse::default())
        }
    }

    #[tokio::test]
    async fn test_fetch_with_ingestion() {
        let backend = Arc::new(CountingBackend::default());
        let ingestor = Ingestor::new(backend.clone(), &Config::default());

        let report = fetch_repository(
            Some(&OneFileRepo),
            Some(&ingestor),
            "https://github.com/octocat/hello",
        )
        .await
        .unwrap();

        assert_eq!(report.owner, "octocat");
        assert_eq!(report.repo, "hello");
        assert_eq!(report.total_files, 1);
        let outcome = report.vectara_ingestion.unwrap();
        assert_eq!(outcome.total_files, report.total_files);
        assert_eq!(outcome.ingested, 1);
        assert_eq!(backend.upserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_without_backend_omits_ingestion() {
        let report = fetch_repository(Some(&OneFileRepo), None, "github.com/octocat/hello")
            .await
            .unwrap();
        assert_eq!(report.total_files, 1);
        assert!(report.vectara_ingestion.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_checked_before_credentials() {
        let err = fetch_repository(None, None, "https://gitlab.com/a/b")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let err = fetch_repository(None, None, "https://github.com/a/b")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_traversal_error_propagates() {
        let err = fetch_repository(Some(&OneFileRepo), None, "https://github.com/a/missing")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::NotFound(_)));
    }
}

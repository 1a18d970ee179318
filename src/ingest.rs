//! Ingestion of harvested files into the search backend.
//!
//! Every entry with ingestible content becomes one [`IndexDocument`] and one
//! upsert, retried on transient failures by the configured [`RetryPolicy`].
//! Entries are processed sequentially; a failed upload is counted and the
//! pass moves on, so ingestion itself never fails.

use std::sync::Arc;

use crate::config::Config;
use crate::error::HarvestError;
use crate::filter::{has_ingestible_content, is_text_file};
use crate::models::{FileEntry, IngestionOutcome, RepositoryReference};
use crate::retry::RetryPolicy;
use crate::traits::{IndexDocument, SearchBackend};

pub struct Ingestor {
    backend: Arc<dyn SearchBackend>,
    retry: RetryPolicy,
    branch: String,
    text_only: bool,
}

impl Ingestor {
    pub fn new(backend: Arc<dyn SearchBackend>, config: &Config) -> Self {
        Self {
            backend,
            retry: RetryPolicy::from_config(&config.ingest),
            branch: config.github.branch.clone(),
            text_only: config.ingest.text_extensions_only,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn should_ingest(&self, entry: &FileEntry) -> bool {
        has_ingestible_content(entry) && (!self.text_only || is_text_file(&entry.name))
    }

    /// Upload `entries` and report how many were ingested, skipped or failed.
    pub async fn ingest(&self, entries: &[FileEntry], repo: &RepositoryReference) -> IngestionOutcome {
        let mut outcome = IngestionOutcome {
            total_files: entries.len(),
            ..IngestionOutcome::default()
        };

        let eligible: Vec<&FileEntry> = entries.iter().filter(|e| self.should_ingest(e)).collect();
        outcome.skipped = entries.len() - eligible.len();

        tracing::info!(
            repo = %repo,
            total = entries.len(),
            eligible = eligible.len(),
            "Starting ingestion"
        );

        let count = eligible.len();
        for (i, entry) in eligible.into_iter().enumerate() {
            tracing::info!(repo = %repo, path = %entry.path, "[{}/{}] Ingesting", i + 1, count);

            let document = build_document(entry, repo, &self.branch);
            let result = self
                .retry
                .run(
                    |_attempt| self.backend.upsert_document(&document),
                    HarvestError::is_transient,
                )
                .await;

            match result {
                Ok(()) => outcome.ingested += 1,
                Err(e) => {
                    tracing::error!(path = %entry.path, error = %e, "Failed to ingest file");
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            repo = %repo,
            ingested = outcome.ingested,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Ingestion complete"
        );
        outcome
    }
}

/// Build the upsert payload for one file.
///
/// The id `owner/name/path` is stable, so re-harvesting a repository
/// replaces documents instead of duplicating them.
pub fn build_document(entry: &FileEntry, repo: &RepositoryReference, branch: &str) -> IndexDocument {
    let path = entry.path.trim_start_matches('/');

    let document_metadata = [
        ("repo", repo.full_name()),
        ("owner", repo.owner.clone()),
        ("source", repo.blob_url(branch, path)),
    ];
    let part_metadata = [
        ("path", path.to_string()),
        ("file_name", entry.name.clone()),
        ("file_type", entry.file_type()),
        ("size", entry.size.to_string()),
    ];

    IndexDocument {
        id: format!("{}/{}", repo.full_name(), path),
        text: entry.content.clone().unwrap_or_default(),
        document_metadata: document_metadata
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        part_metadata: part_metadata
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::filter::BINARY_SENTINEL;
    use crate::models::EntryKind;
    use crate::traits::{QueryRequest, QueryResponse};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Backend that fails selected document ids and counts every call.
    #[derive(Default)]
    struct FlakyBackend {
        failures: HashMap<String, HarvestError>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl FlakyBackend {
        fn failing(mut self, id: &str, err: HarvestError) -> Self {
            self.failures.insert(id.to_string(), err);
            self
        }

        fn calls_for(&self, id: &str) -> u32 {
            self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> u32 {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl SearchBackend for FlakyBackend {
        async fn upsert_document(&self, document: &IndexDocument) -> Result<()> {
            *self.calls.lock().unwrap().entry(document.id.clone()).or_default() += 1;
            match self.failures.get(&document.id) {
                Some(HarvestError::BackendUnavailable(m)) => {
                    Err(HarvestError::BackendUnavailable(m.clone()))
                }
                Some(HarvestError::BackendRejected { status, message }) => {
                    Err(HarvestError::BackendRejected {
                        status: *status,
                        message: message.clone(),
                    })
                }
                _ => Ok(()),
            }
        }

        async fn query(&self, _request: &QueryRequest) -> Result<QueryResponse> {
            Ok(QueryResponse::default())
        }
    }

    fn entry(path: &str, content: Option<&str>) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            kind: EntryKind::File,
            size: content.map(|c| c.len() as u64).unwrap_or(0),
            content: content.map(str::to_string),
            skipped: content.is_none(),
        }
    }

    fn repo() -> RepositoryReference {
        RepositoryReference::new("octocat", "Hello-World")
    }

    fn ingestor(backend: Arc<FlakyBackend>, config: &Config) -> Ingestor {
        Ingestor::new(backend, config).with_retry_policy(RetryPolicy::new(
            config.ingest.max_attempts,
            Duration::ZERO,
        ))
    }

    #[tokio::test]
    async fn test_two_persistent_failures_out_of_ten() {
        let backend = Arc::new(
            FlakyBackend::default()
                .failing(
                    "octocat/Hello-World/src/f3.rs",
                    HarvestError::BackendUnavailable("500".to_string()),
                )
                .failing(
                    "octocat/Hello-World/src/f7.rs",
                    HarvestError::BackendUnavailable("500".to_string()),
                ),
        );
        let entries: Vec<FileEntry> = (0..10)
            .map(|i| entry(&format!("src/f{}.rs", i), Some("pub fn f() -> u32 { 1 }")))
            .collect();

        let outcome = ingestor(backend.clone(), &Config::default())
            .ingest(&entries, &repo())
            .await;

        assert_eq!(
            outcome,
            IngestionOutcome {
                total_files: 10,
                ingested: 8,
                skipped: 0,
                failed: 2,
            }
        );
        assert_eq!(backend.calls_for("octocat/Hello-World/src/f3.rs"), 3);
        assert_eq!(backend.calls_for("octocat/Hello-World/src/f7.rs"), 3);
        assert_eq!(backend.calls_for("octocat/Hello-World/src/f0.rs"), 1);
        assert_eq!(backend.total_calls(), 8 + 2 * 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let backend = Arc::new(FlakyBackend::default().failing(
            "octocat/Hello-World/bad.md",
            HarvestError::BackendRejected {
                status: 400,
                message: "invalid metadata".to_string(),
            },
        ));
        let entries = vec![
            entry("bad.md", Some("# Bad metadata example")),
            entry("ok.md", Some("# Usage notes for ok")),
        ];

        let outcome = ingestor(backend.clone(), &Config::default())
            .ingest(&entries, &repo())
            .await;

        assert_eq!(outcome.ingested, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(backend.calls_for("octocat/Hello-World/bad.md"), 1);
    }

    #[tokio::test]
    async fn test_entries_without_content_are_skipped() {
        let backend = Arc::new(FlakyBackend::default());
        let entries = vec![
            entry("logo.png", None),
            entry("blob.dat", Some(BINARY_SENTINEL)),
            entry("empty.txt", Some("   ")),
            entry("tiny.txt", Some(" ok \n")),
            entry("main.rs", Some("fn main() {}")),
        ];

        let outcome = ingestor(backend.clone(), &Config::default())
            .ingest(&entries, &repo())
            .await;

        assert_eq!(outcome.total_files, 5);
        assert_eq!(outcome.skipped, 4);
        assert_eq!(outcome.ingested, 1);
        assert_eq!(backend.total_calls(), 1);
        assert_eq!(
            outcome.ingested + outcome.skipped + outcome.failed,
            outcome.total_files
        );
    }

    #[tokio::test]
    async fn test_text_only_gate() {
        let backend = Arc::new(FlakyBackend::default());
        let mut config = Config::default();
        config.ingest.text_extensions_only = true;
        let entries = vec![
            entry("data.bin", Some("not really binary")),
            entry("Dockerfile", Some("FROM rust:1.80-slim")),
            entry("lib.rs", Some("pub fn x() -> u8 { 0 }")),
        ];

        let outcome = ingestor(backend.clone(), &config).ingest(&entries, &repo()).await;

        assert_eq!(outcome.ingested, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(backend.calls_for("octocat/Hello-World/data.bin"), 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let backend = Arc::new(FlakyBackend::default());
        let outcome = ingestor(backend, &Config::default()).ingest(&[], &repo()).await;
        assert_eq!(outcome, IngestionOutcome::default());
    }

    #[test]
    fn test_document_metadata() {
        let doc = build_document(&entry("src/main.rs", Some("fn main() {}")), &repo(), "main");
        assert_eq!(doc.id, "octocat/Hello-World/src/main.rs");
        assert_eq!(doc.text, "fn main() {}");
        assert_eq!(doc.document_metadata["repo"], "octocat/Hello-World");
        assert_eq!(doc.document_metadata["owner"], "octocat");
        assert_eq!(
            doc.document_metadata["source"],
            "https://github.com/octocat/Hello-World/blob/main/src/main.rs"
        );
        assert_eq!(doc.part_metadata["path"], "src/main.rs");
        assert_eq!(doc.part_metadata["file_name"], "main.rs");
        assert_eq!(doc.part_metadata["file_type"], "rs");
        assert_eq!(doc.part_metadata["size"], "12");
    }

    #[test]
    fn test_extensionless_file_type() {
        let doc = build_document(&entry("Makefile", Some("all:")), &repo(), "develop");
        assert_eq!(doc.part_metadata["file_type"], "no_extension");
        assert!(doc.document_metadata["source"].contains("/blob/develop/Makefile"));
    }
}

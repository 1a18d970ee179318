//! Core data models used throughout repo-harvest.
//!
//! These types flow from the tree walker through ingestion and out of the
//! HTTP API. All of them are request-scoped: nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
}

impl RepositoryReference {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`, as used in document metadata.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Web URL of a file at `branch`.
    pub fn blob_url(&self, branch: &str, path: &str) -> String {
        format!(
            "https://github.com/{}/{}/blob/{}/{}",
            self.owner,
            self.name,
            branch,
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One file harvested from a repository.
///
/// `content` is `None` for files skipped by the extension denylist. A file
/// whose bytes are not valid UTF-8 carries
/// [`BINARY_SENTINEL`](crate::filter::BINARY_SENTINEL) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub content: Option<String>,
    #[serde(default)]
    pub skipped: bool,
}

impl FileEntry {
    /// Lower-cased extension without the dot; `None` for dotfiles and
    /// names without one.
    pub fn extension(&self) -> Option<String> {
        crate::filter::extension_of(&self.name)
    }

    /// Extension as reported in search metadata.
    pub fn file_type(&self) -> String {
        self.extension()
            .unwrap_or_else(|| "no_extension".to_string())
    }

    pub fn is_root_level(&self) -> bool {
        !self.path.trim_start_matches('/').contains('/')
    }
}

/// Counters for one ingestion pass.
///
/// `ingested + skipped + failed == total_files` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub total_files: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestionOutcome {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Body of `POST /fetch-repo`, also printed by `harvest fetch --json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    pub owner: String,
    pub repo: String,
    pub total_files: usize,
    pub files: Vec<FileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectara_ingestion: Option<IngestionOutcome>,
}

impl HarvestReport {
    /// File counts grouped by extension, most common first.
    pub fn files_by_extension(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for file in &self.files {
            let key = file
                .extension()
                .map(|ext| format!(".{}", ext))
                .unwrap_or_else(|| "no extension".to_string());
            *counts.entry(key).or_default() += 1;
        }
        let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    }
}

/// Optional narrowing requested on `/search`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub repo: Option<String>,
    pub owner: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.repo.is_none() && self.owner.is_none()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(repo) = &self.repo {
            map.insert("repo".to_string(), repo.clone());
        }
        if let Some(owner) = &self.owner {
            map.insert("owner".to_string(), owner.clone());
        }
        map
    }
}

/// One ranked hit returned by `/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSource {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub repo: String,
    pub owner: String,
    pub source_url: String,
    pub relevance_score: f64,
    pub snippet: String,
}

/// Response envelope of `/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub summary: Option<String>,
    pub sources: Vec<SearchSource>,
    pub total_results: usize,
    pub query_time_ms: u64,
    pub filters_applied: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            kind: EntryKind::File,
            size: 1,
            content: Some("x".to_string()),
            skipped: false,
        }
    }

    #[test]
    fn test_blob_url() {
        let repo = RepositoryReference::new("octocat", "Hello-World");
        assert_eq!(
            repo.blob_url("main", "src/lib.rs"),
            "https://github.com/octocat/Hello-World/blob/main/src/lib.rs"
        );
        assert_eq!(repo.full_name(), "octocat/Hello-World");
        assert_eq!(repo.to_string(), "octocat/Hello-World");
    }

    #[test]
    fn test_file_type() {
        assert_eq!(entry("src/main.RS").file_type(), "rs");
        assert_eq!(entry("Makefile").file_type(), "no_extension");
        assert_eq!(entry(".gitignore").file_type(), "no_extension");
    }

    #[test]
    fn test_root_level() {
        assert!(entry("README.md").is_root_level());
        assert!(!entry("docs/README.md").is_root_level());
    }

    #[test]
    fn test_file_entry_serializes_kind_as_type() {
        let json = serde_json::to_value(entry("a.txt")).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["path"], "a.txt");
    }

    #[test]
    fn test_files_by_extension_most_common_first() {
        let report = HarvestReport {
            owner: "o".to_string(),
            repo: "r".to_string(),
            total_files: 4,
            files: vec![entry("a.rs"), entry("b.rs"), entry("c.md"), entry("LICENSE")],
            vectara_ingestion: None,
        };
        let groups = report.files_by_extension();
        assert_eq!(groups[0], (".rs".to_string(), 2));
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_report_omits_missing_ingestion() {
        let report = HarvestReport {
            owner: "o".to_string(),
            repo: "r".to_string(),
            total_files: 0,
            files: vec![],
            vectara_ingestion: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("vectara_ingestion").is_none());
    }

    #[test]
    fn test_filters_map_only_includes_present_fields() {
        let filters = SearchFilters {
            repo: Some("octocat/Hello-World".to_string()),
            owner: None,
        };
        let map = filters.to_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["repo"], "octocat/Hello-World");
        assert!(SearchFilters::default().is_empty());
    }
}

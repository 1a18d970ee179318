//! Query forwarding and response reshaping.
//!
//! A query is validated locally, sent to the [`SearchBackend`] as one
//! combined retrieval + summarization call, and the backend's hits are
//! reshaped into [`SearchSource`]s in backend rank order.
//!
//! Each hit is validated on its own: a hit missing `text` or `score` is
//! dropped with a warning instead of failing the whole query.
//!
//! Repository and owner filters are accepted and echoed back in
//! `filters_applied`, but the backend is always queried unfiltered.

use anyhow::Result as AnyResult;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::{Config, SearchConfig};
use crate::error::{HarvestError, Result};
use crate::filter::extension_of;
use crate::models::{SearchFilters, SearchResult, SearchSource};
use crate::traits::{QueryRequest, SearchBackend};

/// One backend hit after schema validation.
#[derive(Debug, Deserialize)]
struct SearchHit {
    text: String,
    score: f64,
    #[serde(default)]
    part_metadata: BTreeMap<String, Value>,
    #[serde(default)]
    document_metadata: BTreeMap<String, Value>,
    #[serde(default)]
    document_id: Option<String>,
}

/// Reject empty and whitespace-only queries.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::InvalidQuery(
            "query must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Effective result count: the configured default when absent, otherwise
/// clamped into `[1, max_limit]`.
pub fn clamp_limit(limit: Option<i64>, config: &SearchConfig) -> u32 {
    match limit {
        None => config.default_limit,
        Some(n) => n.clamp(1, i64::from(config.max_limit)) as u32,
    }
}

/// Run one query against `backend`.
///
/// The query is validated before the backend is looked at, so an empty
/// query is a 400 even when no backend is configured. The backend sees the
/// trimmed text; the result echoes `query` as given.
pub async fn search(
    backend: Option<&dyn SearchBackend>,
    config: &SearchConfig,
    query: &str,
    limit: Option<i64>,
    filters: &SearchFilters,
) -> Result<SearchResult> {
    let trimmed = validate_query(query)?;
    let backend = backend.ok_or_else(|| {
        HarvestError::MissingCredentials(
            "Vectara credentials are not configured; search is unavailable".to_string(),
        )
    })?;

    if !filters.is_empty() {
        tracing::warn!(
            filters = ?filters.to_map(),
            "Search filters are not applied; returning unfiltered results"
        );
    }

    let request = QueryRequest {
        query: trimmed.to_string(),
        limit: clamp_limit(limit, config),
    };

    let start = Instant::now();
    let response = backend.query(&request).await?;
    let query_time_ms = start.elapsed().as_millis() as u64;

    let sources: Vec<SearchSource> = response
        .search_results
        .into_iter()
        .enumerate()
        .filter_map(|(rank, raw)| match serde_json::from_value::<SearchHit>(raw) {
            Ok(hit) => Some(to_source(hit, config.snippet_chars)),
            Err(e) => {
                tracing::warn!(rank, error = %e, "Dropping malformed search hit");
                None
            }
        })
        .take(request.limit as usize)
        .collect();

    tracing::info!(
        query = trimmed,
        limit = request.limit,
        results = sources.len(),
        query_time_ms,
        "Search complete"
    );

    Ok(SearchResult {
        query: query.to_string(),
        summary: response.summary.filter(|s| !s.trim().is_empty()),
        total_results: sources.len(),
        sources,
        query_time_ms,
        filters_applied: filters.to_map(),
    })
}

fn to_source(hit: SearchHit, snippet_chars: usize) -> SearchSource {
    let file_path = meta_str(&hit.part_metadata, "path").unwrap_or_default();
    let file_name = meta_str(&hit.part_metadata, "file_name")
        .unwrap_or_else(|| file_path.rsplit('/').next().unwrap_or_default().to_string());
    let file_type = meta_str(&hit.part_metadata, "file_type").unwrap_or_else(|| {
        extension_of(&file_name).unwrap_or_else(|| "no_extension".to_string())
    });

    let repo = meta_str(&hit.document_metadata, "repo")
        .or_else(|| repo_from_document_id(hit.document_id.as_deref()))
        .unwrap_or_default();
    let owner = meta_str(&hit.document_metadata, "owner")
        .or_else(|| repo.split_once('/').map(|(owner, _)| owner.to_string()))
        .unwrap_or_default();

    SearchSource {
        file_path,
        file_name,
        file_type,
        repo,
        owner,
        source_url: meta_str(&hit.document_metadata, "source").unwrap_or_default(),
        relevance_score: clamp_score(hit.score),
        snippet: hit.text.chars().take(snippet_chars).collect(),
    }
}

/// Metadata values are strings when we wrote them, but accept numbers and
/// booleans for documents indexed by other tools.
fn meta_str(metadata: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn repo_from_document_id(id: Option<&str>) -> Option<String> {
    let mut parts = id?.splitn(3, '/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, name))
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// CLI entry point for `harvest search`.
pub async fn run_search(
    config: &Config,
    backend: Option<&dyn SearchBackend>,
    query: &str,
    limit: Option<i64>,
    filters: &SearchFilters,
    json: bool,
) -> AnyResult<()> {
    let result = search(backend, &config.search, query, limit, filters).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if let Some(summary) = &result.summary {
        println!("{}", summary.trim());
        println!();
    }

    if result.sources.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, source) in result.sources.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            source.relevance_score,
            source.repo,
            source.file_path
        );
        println!("    type: {}", source.file_type);
        println!("    url: {}", source.source_url);
        println!(
            "    excerpt: \"{}\"",
            source.snippet.replace('\n', " ").trim()
        );
        println!();
    }
    println!(
        "{} result(s) in {} ms",
        result.total_results, result.query_time_ms
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{IndexDocument, QueryResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedBackend {
        response: Value,
        requests: Mutex<Vec<QueryRequest>>,
    }

    impl CannedBackend {
        fn new(response: Value) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for CannedBackend {
        async fn upsert_document(&self, _document: &IndexDocument) -> Result<()> {
            Ok(())
        }

        async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(serde_json::from_value(self.response.clone()).unwrap())
        }
    }

    fn hit(path: &str, score: f64, text: &str) -> Value {
        json!({
            "text": text,
            "score": score,
            "document_id": format!("octocat/Hello-World/{}", path),
            "part_metadata": {
                "path": path,
                "file_name": path.rsplit('/').next().unwrap(),
                "file_type": "rs",
                "size": "12"
            },
            "document_metadata": {
                "repo": "octocat/Hello-World",
                "owner": "octocat",
                "source": format!("https://github.com/octocat/Hello-World/blob/main/{}", path)
            }
        })
    }

    #[test]
    fn test_clamp_limit() {
        let config = SearchConfig::default();
        assert_eq!(clamp_limit(None, &config), 5);
        assert_eq!(clamp_limit(Some(37), &config), 20);
        assert_eq!(clamp_limit(Some(0), &config), 1);
        assert_eq!(clamp_limit(Some(-4), &config), 1);
        assert_eq!(clamp_limit(Some(7), &config), 7);
    }

    #[test]
    fn test_validate_query() {
        assert!(validate_query("").is_err());
        assert!(matches!(
            validate_query(" \n\t"),
            Err(HarvestError::InvalidQuery(_))
        ));
        assert_eq!(validate_query("  how does auth work ").unwrap(), "how does auth work");
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_backend_call() {
        let backend = CannedBackend::new(json!({}));
        let err = search(
            Some(&backend),
            &SearchConfig::default(),
            "   ",
            None,
            &SearchFilters::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarvestError::InvalidQuery(_)));
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_backend_is_missing_credentials() {
        let err = search(None, &SearchConfig::default(), "q", None, &SearchFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_reshapes_hits_in_rank_order() {
        let backend = CannedBackend::new(json!({
            "summary": "The entry point prints a greeting.",
            "search_results": [
                hit("src/main.rs", 0.91, "fn main() {\n    println!(\"hi\");\n}"),
                hit("src/lib.rs", 0.42, "pub fn greet() {}")
            ]
        }));

        let result = search(
            Some(&backend),
            &SearchConfig::default(),
            "what does main do",
            Some(37),
            &SearchFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(backend.requests.lock().unwrap()[0].limit, 20);
        assert_eq!(result.query, "what does main do");
        assert_eq!(
            result.summary.as_deref(),
            Some("The entry point prints a greeting.")
        );
        assert_eq!(result.total_results, 2);

        let first = &result.sources[0];
        assert_eq!(first.file_path, "src/main.rs");
        assert_eq!(first.file_name, "main.rs");
        assert_eq!(first.file_type, "rs");
        assert_eq!(first.repo, "octocat/Hello-World");
        assert_eq!(first.owner, "octocat");
        assert_eq!(
            first.source_url,
            "https://github.com/octocat/Hello-World/blob/main/src/main.rs"
        );
        assert!(first.snippet.contains('\n'));
        assert_eq!(result.sources[1].file_path, "src/lib.rs");
    }

    #[tokio::test]
    async fn test_query_echoed_as_given() {
        let backend = CannedBackend::new(json!({"search_results": [hit("a.rs", 0.5, "a")]}));

        let result = search(
            Some(&backend),
            &SearchConfig::default(),
            "  main entry point \n",
            None,
            &SearchFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.query, "  main entry point \n");
        assert_eq!(backend.requests.lock().unwrap()[0].query, "main entry point");
    }

    #[tokio::test]
    async fn test_sources_capped_at_limit() {
        let backend = CannedBackend::new(json!({
            "search_results": [
                hit("a.rs", 0.9, "a"),
                hit("b.rs", 0.8, "b"),
                hit("c.rs", 0.7, "c"),
                hit("d.rs", 0.6, "d")
            ]
        }));

        let result = search(
            Some(&backend),
            &SearchConfig::default(),
            "q",
            Some(2),
            &SearchFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.total_results, 2);
        assert_eq!(paths_of(&result), vec!["a.rs", "b.rs"]);
    }

    #[tokio::test]
    async fn test_malformed_hits_do_not_use_up_the_limit() {
        let backend = CannedBackend::new(json!({
            "search_results": [
                {"score": 0.9},
                hit("a.rs", 0.8, "a"),
                hit("b.rs", 0.7, "b")
            ]
        }));

        let result = search(
            Some(&backend),
            &SearchConfig::default(),
            "q",
            Some(2),
            &SearchFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(paths_of(&result), vec!["a.rs", "b.rs"]);
    }

    fn paths_of(result: &SearchResult) -> Vec<&str> {
        result.sources.iter().map(|s| s.file_path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_snippet_and_score_bounds() {
        let long = "é".repeat(500);
        let backend = CannedBackend::new(json!({
            "search_results": [hit("a.rs", 1.7, &long), hit("b.rs", -0.3, "short")]
        }));

        let result = search(
            Some(&backend),
            &SearchConfig::default(),
            "q",
            None,
            &SearchFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.sources[0].snippet.chars().count(), 200);
        assert_eq!(result.sources[0].relevance_score, 1.0);
        assert_eq!(result.sources[1].relevance_score, 0.0);
        assert!(result.summary.is_none());
    }

    #[tokio::test]
    async fn test_malformed_hit_dropped() {
        let backend = CannedBackend::new(json!({
            "search_results": [
                {"score": 0.8},
                hit("ok.rs", 0.5, "fine"),
                {"text": "no score"}
            ]
        }));

        let result = search(
            Some(&backend),
            &SearchConfig::default(),
            "q",
            None,
            &SearchFilters::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.total_results, 1);
        assert_eq!(result.sources[0].file_path, "ok.rs");
    }

    #[tokio::test]
    async fn test_filters_echoed_but_not_sent() {
        let backend = CannedBackend::new(json!({"search_results": [hit("a.rs", 0.5, "a")]}));
        let filters = SearchFilters {
            repo: Some("other/repo".to_string()),
            owner: Some("other".to_string()),
        };

        let result = search(Some(&backend), &SearchConfig::default(), "q", None, &filters)
            .await
            .unwrap();

        assert_eq!(result.filters_applied["repo"], "other/repo");
        assert_eq!(result.filters_applied["owner"], "other");
        assert_eq!(result.sources[0].repo, "octocat/Hello-World");
    }

    #[test]
    fn test_metadata_fallbacks() {
        let hit: SearchHit = serde_json::from_value(json!({
            "text": "x",
            "score": 0.5,
            "document_id": "acme/widgets/docs/guide.md",
            "part_metadata": {"path": "docs/guide.md", "size": 42}
        }))
        .unwrap();
        let source = to_source(hit, 200);
        assert_eq!(source.file_name, "guide.md");
        assert_eq!(source.file_type, "md");
        assert_eq!(source.repo, "acme/widgets");
        assert_eq!(source.owner, "acme");
        assert_eq!(source.source_url, "");
    }
}

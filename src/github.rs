//! GitHub REST "contents" API client.
//!
//! Lists directories and fetches files through
//! `GET /repos/{owner}/{repo}/contents/{path}`. Every request carries the
//! bearer token and the pinned API version header.
//!
//! # Status mapping
//!
//! | GitHub status | Error |
//! |---------------|-------|
//! | 404 | `NotFound` |
//! | 403, 429 | `RateLimited` |
//! | other non-2xx, transport errors, bad JSON | `UpstreamUnavailable` |

use async_trait::async_trait;
use base64::Engine;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::GitHubConfig;
use crate::error::{HarvestError, Result};
use crate::filter::BINARY_SENTINEL;
use crate::models::RepositoryReference;
use crate::traits::{RemoteEntry, RemoteFile, RepoSource};

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("repo-harvest/", env!("CARGO_PKG_VERSION"));

pub struct GitHubClient {
    client: reqwest::Client,
    api_url: Url,
    token: String,
}

impl GitHubClient {
    /// Build a client for `config.api_url` authenticated with `token`.
    pub fn new(config: &GitHubConfig, token: impl Into<String>) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            HarvestError::UpstreamUnavailable(format!(
                "invalid GitHub API URL '{}': {}",
                config.api_url, e
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HarvestError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            token: token.into(),
        })
    }

    fn contents_url(&self, repo: &RepositoryReference, path: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                HarvestError::UpstreamUnavailable(format!(
                    "GitHub API URL cannot be a base: {}",
                    self.api_url
                ))
            })?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        repo: &RepositoryReference,
        path: &str,
    ) -> Result<T> {
        let url = self.contents_url(repo, path)?;
        tracing::debug!(%url, "GitHub request");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| HarvestError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, repo, path, &body));
        }

        response.json::<T>().await.map_err(|e| {
            HarvestError::UpstreamUnavailable(format!(
                "unexpected GitHub response for {}/{}: {}",
                repo, path, e
            ))
        })
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn list_directory(
        &self,
        repo: &RepositoryReference,
        path: &str,
    ) -> Result<Vec<RemoteEntry>> {
        self.get_json(repo, path).await
    }

    async fn fetch_file(&self, repo: &RepositoryReference, path: &str) -> Result<RemoteFile> {
        self.get_json(repo, path).await
    }
}

fn classify_status(
    status: StatusCode,
    repo: &RepositoryReference,
    path: &str,
    body: &str,
) -> HarvestError {
    let location = if path.is_empty() {
        repo.to_string()
    } else {
        format!("{}/{}", repo, path)
    };
    tracing::error!(status = status.as_u16(), %location, body, "GitHub API error");

    match status {
        StatusCode::NOT_FOUND => HarvestError::NotFound(location),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => HarvestError::RateLimited(
            format!("GitHub returned {} for {}", status.as_u16(), location),
        ),
        _ => HarvestError::UpstreamUnavailable(format!(
            "GitHub API error {} for {}: {}",
            status.as_u16(),
            location,
            body
        )),
    }
}

/// Decode the content of a fetched file.
///
/// Base64 payloads (GitHub wraps them at 60 columns) are decoded as UTF-8;
/// anything that is not valid base64 or not valid UTF-8 becomes
/// [`BINARY_SENTINEL`]. Content with another or no encoding is returned as-is.
pub fn decode_content(file: &RemoteFile) -> String {
    let Some(raw) = file.content.as_deref() else {
        return String::new();
    };

    if file.encoding.as_deref() != Some("base64") {
        return raw.to_string();
    }

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| BINARY_SENTINEL.to_string()),
        Err(_) => BINARY_SENTINEL.to_string(),
    }
}

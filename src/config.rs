//! Service configuration.
//!
//! Settings come from an optional TOML file; every field has a default so
//! the service runs with no file at all. Credentials are never read from the
//! file: [`Config::with_env_credentials`] layers them on from the process
//! environment once at startup, and the resulting value is passed by
//! reference into each component.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [github]
//! api_url = "https://api.github.com"
//! branch = "main"
//!
//! [ingest]
//! max_attempts = 3
//! base_delay_ms = 1000
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const VECTARA_CUSTOMER_ID_VAR: &str = "VECTARA_CUSTOMER_ID";
pub const VECTARA_CORPUS_KEY_VAR: &str = "VECTARA_CORPUS_KEY";
pub const VECTARA_API_KEY_VAR: &str = "VECTARA_API_KEY";

/// Hard ceiling for `search.max_limit`.
pub const MAX_SEARCH_LIMIT: u32 = 20;
/// Hard ceiling for `search.snippet_chars`.
pub const MAX_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub vectara: VectaraConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    /// Populated from the environment, never from the file.
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// Branch name used when building `blob` source URLs for indexed files.
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            branch: default_branch(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectaraConfig {
    #[serde(default = "default_vectara_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Generation preset used for the summary of a query.
    #[serde(default = "default_summarizer")]
    pub summarizer: String,
    #[serde(default = "default_response_language")]
    pub response_language: String,
}

impl Default for VectaraConfig {
    fn default() -> Self {
        Self {
            api_url: default_vectara_api_url(),
            timeout_secs: default_timeout_secs(),
            summarizer: default_summarizer(),
            response_language: default_response_language(),
        }
    }
}

fn default_vectara_api_url() -> String {
    "https://api.vectara.io".to_string()
}
fn default_summarizer() -> String {
    "vectara-summary-ext-24-05-med-omni".to_string()
}
fn default_response_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Total attempts per document, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Only ingest known text/code extensions and extensionless build files.
    #[serde(default)]
    pub text_extensions_only: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            text_extensions_only: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_limit() -> u32 {
    5
}
fn default_max_limit() -> u32 {
    20
}
fn default_snippet_chars() -> usize {
    200
}

/// Secrets for the two remote services.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub github_token: Option<String>,
    pub vectara: Option<VectaraCredentials>,
}

#[derive(Debug, Clone)]
pub struct VectaraCredentials {
    pub customer_id: String,
    pub corpus_key: String,
    pub api_key: String,
}

impl Config {
    /// Read credentials from the process environment.
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials_from(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`, treating blank values as unset.
    ///
    /// Vectara credentials are all-or-nothing: if any of the three is
    /// missing, ingestion and search are disabled and the missing names are
    /// logged.
    pub fn with_credentials_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        self.credentials.github_token = read(GITHUB_TOKEN_VAR);
        if self.credentials.github_token.is_none() {
            tracing::warn!("{} is not set; repository fetches will fail", GITHUB_TOKEN_VAR);
        }

        let customer_id = read(VECTARA_CUSTOMER_ID_VAR);
        let corpus_key = read(VECTARA_CORPUS_KEY_VAR);
        let api_key = read(VECTARA_API_KEY_VAR);

        self.credentials.vectara = match (customer_id, corpus_key, api_key) {
            (Some(customer_id), Some(corpus_key), Some(api_key)) => Some(VectaraCredentials {
                customer_id,
                corpus_key,
                api_key,
            }),
            (customer_id, corpus_key, api_key) => {
                let missing: Vec<&str> = [
                    (VECTARA_CUSTOMER_ID_VAR, customer_id.is_none()),
                    (VECTARA_CORPUS_KEY_VAR, corpus_key.is_none()),
                    (VECTARA_API_KEY_VAR, api_key.is_none()),
                ]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| *name)
                .collect();
                tracing::warn!(
                    missing = %missing.join(", "),
                    "Vectara credentials incomplete; ingestion disabled and search unavailable"
                );
                None
            }
        };

        self
    }

    fn validate(&self) -> Result<()> {
        if self.ingest.max_attempts == 0 {
            anyhow::bail!("ingest.max_attempts must be >= 1");
        }
        if self.search.default_limit == 0 {
            anyhow::bail!("search.default_limit must be >= 1");
        }
        if self.search.default_limit > self.search.max_limit {
            anyhow::bail!(
                "search.default_limit ({}) must not exceed search.max_limit ({})",
                self.search.default_limit,
                self.search.max_limit
            );
        }
        if self.search.max_limit > MAX_SEARCH_LIMIT {
            anyhow::bail!(
                "search.max_limit ({}) must not exceed {}",
                self.search.max_limit,
                MAX_SEARCH_LIMIT
            );
        }
        if self.search.snippet_chars == 0 {
            anyhow::bail!("search.snippet_chars must be > 0");
        }
        if self.search.snippet_chars > MAX_SNIPPET_CHARS {
            anyhow::bail!(
                "search.snippet_chars ({}) must not exceed {}",
                self.search.snippet_chars,
                MAX_SNIPPET_CHARS
            );
        }
        Ok(())
    }
}

/// Load configuration from `path`, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    config.validate()?;
    Ok(config)
}

//! # repo-harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest [--config ./harvest.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest serve` | Start the HTTP API server |
//! | `harvest fetch <url>` | Harvest a repository and index it |
//! | `harvest search "<query>"` | Query the search backend |
//!
//! Credentials are read from `GITHUB_TOKEN`, `VECTARA_CUSTOMER_ID`,
//! `VECTARA_CORPUS_KEY` and `VECTARA_API_KEY`. Log verbosity follows
//! `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use repo_harvest::config::{self, Config};
use repo_harvest::fetch::run_fetch;
use repo_harvest::github::GitHubClient;
use repo_harvest::ingest::Ingestor;
use repo_harvest::models::SearchFilters;
use repo_harvest::search::run_search;
use repo_harvest::server::run_server;
use repo_harvest::traits::{RepoSource, SearchBackend};
use repo_harvest::vectara::VectaraClient;

/// Harvest GitHub repositories into a semantic-search backend and query them.
#[derive(Parser)]
#[command(name = "harvest", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Walk a GitHub repository, print its files, and index them.
    Fetch {
        /// Repository URL, e.g. `https://github.com/owner/repo`.
        repo_url: String,

        /// Skip indexing even when search backend credentials are set.
        #[arg(long)]
        no_ingest: bool,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a natural-language question over indexed repositories.
    Search {
        query: String,

        /// Maximum number of sources to return (clamped to `[search].max_limit`).
        #[arg(long)]
        limit: Option<i64>,

        /// Repository filter (`owner/name`). Accepted but not applied.
        #[arg(long)]
        repo: Option<String>,

        /// Owner filter. Accepted but not applied.
        #[arg(long)]
        owner: Option<String>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("repo_harvest=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn search_backend(config: &Config) -> anyhow::Result<Option<Arc<dyn SearchBackend>>> {
    match &config.credentials.vectara {
        Some(creds) => Ok(Some(Arc::new(VectaraClient::new(
            &config.vectara,
            creds.clone(),
        )?))),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut cfg = config::load_config(cli.config.as_deref())?.with_env_credentials();

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            run_server(&cfg).await?;
        }
        Commands::Fetch {
            repo_url,
            no_ingest,
            json,
        } => {
            let source = match &cfg.credentials.github_token {
                Some(token) => Some(GitHubClient::new(&cfg.github, token.clone())?),
                None => None,
            };
            let ingestor = if no_ingest {
                None
            } else {
                search_backend(&cfg)?.map(|backend| Ingestor::new(backend, &cfg))
            };
            run_fetch(
                source.as_ref().map(|s| s as &dyn RepoSource),
                ingestor.as_ref(),
                &repo_url,
                json,
            )
            .await?;
        }
        Commands::Search {
            query,
            limit,
            repo,
            owner,
            json,
        } => {
            let backend = search_backend(&cfg)?;
            let filters = SearchFilters { repo, owner };
            run_search(&cfg, backend.as_deref(), &query, limit, &filters, json).await?;
        }
    }

    Ok(())
}

//! # repo-harvest
//!
//! Harvest GitHub repositories into a semantic-search backend and query
//! them over HTTP.
//!
//! A repository is walked through the GitHub contents API, filtered
//! (binary denylist, a single README), uploaded to Vectara one document per
//! file, and later searched through Vectara's combined retrieval and
//! summarization endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │   GitHub    │──▶│ Walker +    │──▶│  Ingestor   │──▶ Vectara
//! │ contents API│   │ Filter      │   │ (retrying)  │
//! └─────────────┘   └─────────────┘   └─────────────┘
//!                                            ▲
//!                      ┌──────────┐    ┌─────┴────┐
//!                      │   CLI    │    │   HTTP   │──▶ Searcher ──▶ Vectara
//!                      │(harvest) │    │  (axum)  │
//!                      └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=... VECTARA_CUSTOMER_ID=... VECTARA_CORPUS_KEY=... VECTARA_API_KEY=...
//! harvest fetch https://github.com/octocat/Hello-World
//! harvest search "what does this repository do?"
//! harvest serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`error`] | Error taxonomy and HTTP status mapping |
//! | [`models`] | Core data types |
//! | [`repo_url`] | GitHub URL parsing |
//! | [`filter`] | Denylist, text allowlist, README deduplication |
//! | [`traits`] | `RepoSource` and `SearchBackend` seams |
//! | [`github`] | GitHub contents API client |
//! | [`walker`] | Depth-first repository traversal |
//! | [`retry`] | Exponential-backoff retry policy |
//! | [`vectara`] | Vectara v2 REST client |
//! | [`ingest`] | Per-file upload with outcome counts |
//! | [`search`] | Query validation and response reshaping |
//! | [`fetch`] | Harvest orchestration |
//! | [`server`] | HTTP API |

pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod github;
pub mod ingest;
pub mod models;
pub mod repo_url;
pub mod retry;
pub mod search;
pub mod server;
pub mod traits;
pub mod vectara;
pub mod walker;

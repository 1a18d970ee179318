//! Vectara v2 REST backend.
//!
//! Implements [`SearchBackend`] against two corpus endpoints:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upsert | `POST /v2/corpora/{corpus_key}/documents` |
//! | replace | `DELETE /v2/corpora/{corpus_key}/documents/{id}`, then POST again |
//! | query | `POST /v2/corpora/{corpus_key}/query` |
//!
//! The documents API rejects a duplicate id with 409, so an upsert that hits
//! 409 deletes the existing document and creates it once more.
//!
//! Statuses ≥ 500, 429 and transport errors map to
//! [`HarvestError::BackendUnavailable`] (retryable); any other non-2xx maps to
//! [`HarvestError::BackendRejected`].

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::{VectaraConfig, VectaraCredentials};
use crate::error::{HarvestError, Result};
use crate::traits::{IndexDocument, QueryRequest, QueryResponse, SearchBackend};

pub struct VectaraClient {
    client: reqwest::Client,
    api_url: Url,
    credentials: VectaraCredentials,
    summarizer: String,
    response_language: String,
}

#[derive(Serialize)]
struct CoreDocument<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    metadata: &'a BTreeMap<String, String>,
    document_parts: [DocumentPart<'a>; 1],
}

#[derive(Serialize)]
struct DocumentPart<'a> {
    text: &'a str,
    metadata: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    search: SearchParams,
    generation: GenerationParams<'a>,
}

#[derive(Serialize)]
struct SearchParams {
    limit: u32,
}

#[derive(Serialize)]
struct GenerationParams<'a> {
    generation_preset_name: &'a str,
    max_used_search_results: u32,
    response_language: &'a str,
}

impl VectaraClient {
    pub fn new(config: &VectaraConfig, credentials: VectaraCredentials) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            HarvestError::BackendUnavailable(format!(
                "invalid Vectara API URL '{}': {}",
                config.api_url, e
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HarvestError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            credentials,
            summarizer: config.summarizer.clone(),
            response_language: config.response_language.clone(),
        })
    }

    fn corpus_url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                HarvestError::BackendUnavailable(format!(
                    "Vectara API URL cannot be a base: {}",
                    self.api_url
                ))
            })?
            .pop_if_empty()
            .extend(["v2", "corpora", self.credentials.corpus_key.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-api-key", &self.credentials.api_key)
            .header("customer-id", &self.credentials.customer_id)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| HarvestError::BackendUnavailable(e.to_string()))?;
        Ok(response)
    }

    async fn create_document(&self, document: &IndexDocument) -> Result<StatusCode> {
        let url = self.corpus_url(&["documents"])?;
        let response = self
            .send(self.client.post(url).json(&document_body(document)))
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            return Ok(status);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_backend_status(status, &body))
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let url = self.corpus_url(&["documents", id])?;
        let response = self.send(self.client.delete(url)).await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_backend_status(status, &body))
    }
}

#[async_trait]
impl SearchBackend for VectaraClient {
    async fn upsert_document(&self, document: &IndexDocument) -> Result<()> {
        if self.create_document(document).await? != StatusCode::CONFLICT {
            return Ok(());
        }

        tracing::debug!(id = %document.id, "Document exists, replacing");
        self.delete_document(&document.id).await?;

        match self.create_document(document).await? {
            StatusCode::CONFLICT => Err(HarvestError::BackendRejected {
                status: StatusCode::CONFLICT.as_u16(),
                message: format!("document {} still exists after delete", document.id),
            }),
            _ => Ok(()),
        }
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let url = self.corpus_url(&["query"])?;
        let body = QueryBody {
            query: &request.query,
            search: SearchParams {
                limit: request.limit,
            },
            generation: GenerationParams {
                generation_preset_name: &self.summarizer,
                max_used_search_results: request.limit,
                response_language: &self.response_language,
            },
        };

        let response = self.send(self.client.post(url).json(&body)).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_backend_status(status, &body));
        }

        response
            .json::<QueryResponse>()
            .await
            .map_err(|e| HarvestError::BackendUnavailable(format!("malformed query response: {}", e)))
    }
}

fn document_body(document: &IndexDocument) -> CoreDocument<'_> {
    CoreDocument {
        id: &document.id,
        kind: "core",
        metadata: &document.document_metadata,
        document_parts: [DocumentPart {
            text: &document.text,
            metadata: &document.part_metadata,
        }],
    }
}

/// Map a non-2xx backend status to the error taxonomy.
pub fn classify_backend_status(status: StatusCode, body: &str) -> HarvestError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        HarvestError::BackendUnavailable(format!("Vectara returned {}: {}", status.as_u16(), body))
    } else {
        HarvestError::BackendRejected {
            status: status.as_u16(),
            message: body.to_string(),
        }
    }
}

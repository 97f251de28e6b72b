//! Embedding search service client.
//!
//! Endpoint: POST {base}/get-similar
//! Auth: optional Bearer token

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_success, join_url, Retriever};
use crate::domain::{CaseQuery, ContextDocument};

/// Retrieval backed by the embedding service
pub struct EmbeddingRetriever {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SimilarRequest<'a> {
    raw_text: &'a str,
    top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    consultant_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speciality: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SimilarResponse {
    #[serde(default)]
    documents: Vec<ContextDocument>,
}

impl EmbeddingRetriever {
    pub fn new(base_url: impl Into<String>, token: Option<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client,
        }
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn retrieve(&self, query: &CaseQuery) -> Result<Vec<ContextDocument>> {
        let url = join_url(&self.base_url, "get-similar");
        let payload = SimilarRequest {
            raw_text: &query.text,
            top_k: query.k,
            consultant_id: query.consultant_id.as_deref(),
            speciality: query.speciality.as_deref(),
        };

        let mut request = self.client.post(&url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach embedding service at {}", url))?;
        let response = ensure_success(response, "Embedding service").await?;

        let body: SimilarResponse = response
            .json()
            .await
            .context("Failed to parse embedding service response")?;

        debug!(documents = body.documents.len(), "Embedding search complete");
        Ok(body.documents)
    }
}

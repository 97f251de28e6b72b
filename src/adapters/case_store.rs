//! Case service client.
//!
//! Endpoints:
//! - GET  {base}/cases/{id}
//! - POST {base}/cases/{id}/add-suggestions

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use super::{ensure_success, segment_url, CaseDetails, CaseStore};
use crate::domain::Suggestion;

/// Case store backed by the case service HTTP API
pub struct HttpCaseStore {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct AddSuggestions<'a> {
    suggestions: &'a [Suggestion],
}

impl HttpCaseStore {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// `{base}/cases/{id}[/suffix]` with the id escaped as one segment
    fn case_url(&self, case_id: &str, suffix: Option<&str>) -> Result<reqwest::Url> {
        let mut segments = vec!["cases", case_id];
        segments.extend(suffix);
        segment_url(&self.base_url, segments)
            .with_context(|| format!("Invalid case id '{}'", case_id))
    }
}

#[async_trait]
impl CaseStore for HttpCaseStore {
    async fn get_case(&self, case_id: &str) -> Result<CaseDetails> {
        let url = self.case_url(case_id, None)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to reach case service at {}", url))?;
        let response = ensure_success(response, "Case service").await?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse case {}", case_id))
    }

    async fn post_suggestions(&self, case_id: &str, suggestions: &[Suggestion]) -> Result<()> {
        let url = self.case_url(case_id, Some("add-suggestions"))?;

        let response = self
            .client
            .post(url.clone())
            .json(&AddSuggestions { suggestions })
            .send()
            .await
            .with_context(|| format!("Failed to reach case service at {}", url))?;
        let response = ensure_success(response, "Case service").await?;

        // 204 has no body; anything else is an acknowledgement we only log
        if response.status() != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            debug!(%case_id, body = %body.trim(), "Case service accepted suggestions");
        }

        Ok(())
    }
}

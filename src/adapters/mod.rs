//! Adapter interfaces for external systems.
//!
//! The pipeline talks to four collaborators, each behind a trait with one
//! production implementation:
//! - `Retriever`: embedding search service (HTTP)
//! - `Generator`: OpenAI-compatible chat completions (HTTP)
//! - `CaseStore`: case service (HTTP)
//! - `EventPublisher`: message broker (AMQP)

pub mod amqp;
pub mod case_store;
pub mod llm;
pub mod retrieval;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{CaseQuery, ContextDocument, SolutionsGenerated, Suggestion};

pub use amqp::{process_body, settlement_for, AmqpPublisher, CaseAssignedConsumer, Processed};
pub use case_store::HttpCaseStore;
pub use llm::LlmGenerator;
pub use retrieval::EmbeddingRetriever;

/// Finds context documents relevant to a query
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    async fn retrieve(&self, query: &CaseQuery) -> Result<Vec<ContextDocument>>;
}

/// Produces candidate solutions from a case and its context
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Ask for `count` suggestions. Implementations are trusted to honor the
    /// count; callers neither truncate nor pad.
    async fn generate(
        &self,
        case_text: &str,
        docs: &[ContextDocument],
        count: u32,
    ) -> Result<Vec<Suggestion>>;
}

/// Case details as returned by the case service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaseDetails {
    pub description: String,
}

/// Reads cases and stores suggestions against them
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn get_case(&self, case_id: &str) -> Result<CaseDetails>;

    async fn post_suggestions(&self, case_id: &str, suggestions: &[Suggestion]) -> Result<()>;
}

/// Publishes outbound integration events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_solutions(&self, event: &SolutionsGenerated) -> Result<()>;
}

/// Build the HTTP client shared by every HTTP adapter.
///
/// The timeout bounds each request end to end.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Join a base URL and a path without doubling or dropping slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Append `segments` to `base`, each percent-encoded as a single path segment.
///
/// `/`, `?` and `%` inside a segment are escaped, so caller-supplied ids
/// cannot leave the intended path. Empty, `.` and `..` segments are refused.
pub(crate) fn segment_url<I, S>(base: &str, segments: I) -> Result<reqwest::Url>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url =
        reqwest::Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?;
    let segments: Vec<S> = segments.into_iter().collect();

    if let Some(bad) = segments
        .iter()
        .map(AsRef::as_ref)
        .find(|s| matches!(*s, "" | "." | ".."))
    {
        anyhow::bail!("Refusing path segment '{}'", bad);
    }

    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Base URL cannot carry a path: {}", base))?
        .pop_if_empty()
        .extend(segments.iter().map(AsRef::as_ref));

    Ok(url)
}

/// Turn a non-success response into an error carrying the status and body
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{} returned {}: {}", what, status, body.trim())
}

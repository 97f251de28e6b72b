//! The solve pipeline: retrieval, then generation, then result assembly.
//!
//! Both collaborator calls are bounded by a per-call timeout and any failure
//! is reported as `SolveError::UpstreamUnavailable` tagged with the stage.
//! No retries happen here.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{Generator, Retriever};
use crate::domain::{CaseQuery, SolveResult};

use super::preprocess::{apply_all, QueryTransform};

/// Pipeline stage that talks to a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieval,
    Generation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the pipeline
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("{stage} service unavailable: {source:#}")]
    UpstreamUnavailable {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl SolveError {
    pub fn unavailable(stage: Stage, source: anyhow::Error) -> Self {
        Self::UpstreamUnavailable { stage, source }
    }

    /// The stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            Self::UpstreamUnavailable { stage, .. } => *stage,
        }
    }
}

/// Retrieval-augmented suggestion pipeline
pub struct SolvePipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    pre_processors: Vec<Box<dyn QueryTransform>>,
    call_timeout: Duration,
}

impl SolvePipeline {
    /// Create a pipeline with no pre-processors.
    ///
    /// `call_timeout` bounds each collaborator call separately.
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            generator,
            pre_processors: Vec::new(),
            call_timeout,
        }
    }

    /// Append a query transform; transforms run in insertion order
    pub fn with_pre_processor(mut self, transform: impl QueryTransform + 'static) -> Self {
        self.pre_processors.push(Box::new(transform));
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Retrieve context for `query` and generate suggestions.
    ///
    /// `requested_count` overrides `query.k` as the number of suggestions to
    /// ask for. Both are expected to be validated by the caller.
    #[instrument(skip(self, query), fields(k = query.k, requested = ?requested_count))]
    pub async fn solve(
        &self,
        query: &CaseQuery,
        requested_count: Option<u32>,
    ) -> Result<SolveResult, SolveError> {
        let started = Instant::now();
        let count = requested_count.unwrap_or(query.k);

        let prepared = apply_all(&self.pre_processors, query.clone());

        let docs = self
            .bounded(Stage::Retrieval, self.retriever.retrieve(&prepared))
            .await?;
        debug!(
            retriever = self.retriever.name(),
            docs = docs.len(),
            "Retrieved context"
        );

        let suggestions = self
            .bounded(
                Stage::Generation,
                self.generator.generate(&query.text, &docs, count),
            )
            .await?;

        if suggestions.is_empty() {
            error!(generator = self.generator.name(), "Generation returned nothing");
            return Err(SolveError::unavailable(
                Stage::Generation,
                anyhow::anyhow!("{} returned no suggestions", self.generator.name()),
            ));
        }

        if suggestions.len() != count as usize {
            warn!(
                requested = count,
                returned = suggestions.len(),
                "Generator did not honor the requested count"
            );
        }

        info!(
            suggestions = suggestions.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Case solved"
        );

        Ok(SolveResult::new(suggestions))
    }

    /// Await a collaborator call under the per-call timeout
    async fn bounded<T, F>(&self, stage: Stage, call: F) -> Result<T, SolveError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let outcome = match timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("timed out after {:?}", self.call_timeout)),
        };

        outcome.map_err(|e| {
            error!(%stage, error = %format!("{:#}", e), "Collaborator call failed");
            SolveError::unavailable(stage, e)
        })
    }
}

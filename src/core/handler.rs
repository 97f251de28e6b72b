//! Handling of `CaseAssigned` events.
//!
//! Each event walks Idle → Fetching → Solving → Posting → Publishing → Idle.
//! A failure at any stage aborts the event; later stages never run, so a
//! failed or cancelled event publishes nothing.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::adapters::{CaseStore, EventPublisher};
use crate::domain::{CaseAssigned, CaseQuery, SolutionsGenerated, ValidationError};

use super::pipeline::{SolveError, SolvePipeline};

/// Suggestion count used for events, which carry no count of their own
pub const DEFAULT_EVENT_COUNT: u32 = 10;

/// Where an event currently is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStage {
    Idle,
    Fetching,
    Solving,
    Posting,
    Publishing,
}

impl fmt::Display for HandlerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Solving => "solving",
            Self::Posting => "posting",
            Self::Publishing => "publishing",
        };
        f.write_str(name)
    }
}

/// Why an event could not be processed
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Failed to fetch case {case_id}: {source:#}")]
    FetchCase {
        case_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Case {case_id} cannot be solved: {source}")]
    InvalidCase {
        case_id: String,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to solve case {case_id}: {source}")]
    Solve {
        case_id: String,
        #[source]
        source: SolveError,
    },

    #[error("Failed to post suggestions for case {case_id}: {source:#}")]
    PostSuggestions {
        case_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to publish solutions for case {case_id}: {source:#}")]
    Publish {
        case_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl HandlerError {
    /// The stage the event was in when it failed
    pub fn stage(&self) -> HandlerStage {
        match self {
            Self::FetchCase { .. } | Self::InvalidCase { .. } => HandlerStage::Fetching,
            Self::Solve { .. } => HandlerStage::Solving,
            Self::PostSuggestions { .. } => HandlerStage::Posting,
            Self::Publish { .. } => HandlerStage::Publishing,
        }
    }
}

/// What to do with a delivery whose processing failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Acknowledge and log; the event is lost
    #[default]
    Drop,

    /// Negative-acknowledge with requeue; the broker redelivers
    Requeue,

    /// Negative-acknowledge without requeue; a dead-letter exchange may take it
    Reject,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "requeue" => Ok(Self::Requeue),
            "reject" | "dead_letter" | "dead-letter" => Ok(Self::Reject),
            other => Err(format!(
                "Unknown failure policy '{}' (expected drop, requeue or reject)",
                other
            )),
        }
    }
}

/// How a delivery is settled with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Requeue,
    Reject,
}

impl FailurePolicy {
    /// Settlement for a processed delivery
    pub fn settle<T, E>(&self, outcome: &Result<T, E>) -> Settlement {
        match (outcome, self) {
            (Ok(_), _) => Settlement::Ack,
            (Err(_), Self::Drop) => Settlement::Ack,
            (Err(_), Self::Requeue) => Settlement::Requeue,
            (Err(_), Self::Reject) => Settlement::Reject,
        }
    }
}

/// Solves assigned cases and hands the results back
pub struct CaseAssignedHandler {
    case_store: Arc<dyn CaseStore>,
    publisher: Arc<dyn EventPublisher>,
    pipeline: Arc<SolvePipeline>,
    default_count: u32,
}

impl CaseAssignedHandler {
    pub fn new(
        case_store: Arc<dyn CaseStore>,
        publisher: Arc<dyn EventPublisher>,
        pipeline: Arc<SolvePipeline>,
    ) -> Self {
        Self {
            case_store,
            publisher,
            pipeline,
            default_count: DEFAULT_EVENT_COUNT,
        }
    }

    /// Override the suggestion count used for events
    pub fn with_default_count(mut self, count: u32) -> Self {
        self.default_count = count;
        self
    }

    /// Process one event end to end, returning what was published
    #[instrument(skip(self, event), fields(case_id = %event.case_id, consultant_id = %event.consultant_id))]
    pub async fn handle(&self, event: &CaseAssigned) -> Result<SolutionsGenerated, HandlerError> {
        let case_id = event.case_id.clone();

        enter(HandlerStage::Fetching);
        let case = self
            .case_store
            .get_case(&case_id)
            .await
            .map_err(|source| HandlerError::FetchCase {
                case_id: case_id.clone(),
                source,
            })?;

        // Description and count only; the assignee does not narrow retrieval
        let query = CaseQuery::new(case.description, self.default_count);
        query
            .validate()
            .map_err(|source| HandlerError::InvalidCase {
                case_id: case_id.clone(),
                source,
            })?;

        enter(HandlerStage::Solving);
        let result = self
            .pipeline
            .solve(&query, None)
            .await
            .map_err(|source| HandlerError::Solve {
                case_id: case_id.clone(),
                source,
            })?;

        enter(HandlerStage::Posting);
        self.case_store
            .post_suggestions(&case_id, &result.suggestions)
            .await
            .map_err(|source| HandlerError::PostSuggestions {
                case_id: case_id.clone(),
                source,
            })?;

        enter(HandlerStage::Publishing);
        let published = SolutionsGenerated::new(case_id.clone(), result.suggestions);
        self.publisher
            .publish_solutions(&published)
            .await
            .map_err(|source| HandlerError::Publish {
                case_id: case_id.clone(),
                source,
            })?;

        enter(HandlerStage::Idle);
        info!(suggestions = published.solutions.len(), "Case assignment handled");

        Ok(published)
    }
}

fn enter(stage: HandlerStage) {
    debug!(%stage, "Entering stage");
}

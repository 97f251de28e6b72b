//! Core orchestration logic.
//!
//! This module contains:
//! - Pipeline: retrieval → generation sequencing with stage-tagged errors
//! - Preprocess: ordered query transforms applied before retrieval
//! - Extract: tolerant recovery of suggestions from model output
//! - Handler: the `CaseAssigned` event flow

pub mod extract;
pub mod handler;
pub mod pipeline;
pub mod preprocess;

// Re-export commonly used types
pub use extract::extract_suggestions;
pub use handler::{
    CaseAssignedHandler, FailurePolicy, HandlerError, HandlerStage, Settlement,
    DEFAULT_EVENT_COUNT,
};
pub use pipeline::{SolveError, SolvePipeline, Stage};
pub use preprocess::{normalize_whitespace, QueryTransform};

//! Domain types for the case solver.
//!
//! This module contains the core data structures:
//! - Query: case queries, context documents, suggestions
//! - Events: broker messages consumed and published

pub mod events;
pub mod query;

// Re-export commonly used types
pub use events::{decode_case_assigned, CaseAssigned, Envelope, EnvelopeError, SolutionsGenerated};
pub use query::{
    validate_requested_count, CaseQuery, ContextDocument, SolveResult, Suggestion, ValidationError,
};

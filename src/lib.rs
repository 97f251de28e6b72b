//! case-solver - Retrieval-augmented solution suggestions for support cases
//!
//! Retrieves context documents for a case from an embedding search service,
//! asks a language model for candidate solutions and returns them, either
//! synchronously over HTTP or in response to `CaseAssigned` broker events.
//!
//! # Architecture
//!
//! ```text
//! POST /solve-case ─┐
//!                   ├─> SolvePipeline: retrieval ──> generation ──> suggestions
//! CaseAssigned ─────┘        (on events: post to case service, publish SolutionsGenerated)
//! ```
//!
//! # Modules
//!
//! - `adapters`: External collaborators (embedding search, LLM, case service, RabbitMQ)
//! - `core`: Pipeline, query pre-processing, output extraction, event handling
//! - `domain`: Data structures (CaseQuery, Suggestion, events)
//! - `server`: HTTP routes
//! - `config`: Settings loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve HTTP and consume events
//! case-solver run
//!
//! # Solve one case from the terminal
//! case-solver solve "VPN drops every hour" -k 5
//! ```

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;

// Re-export main types at crate root for convenience
pub use crate::config::Settings;
pub use crate::core::{CaseAssignedHandler, SolveError, SolvePipeline, Stage};
pub use crate::domain::{CaseAssigned, CaseQuery, ContextDocument, SolutionsGenerated, SolveResult, Suggestion};

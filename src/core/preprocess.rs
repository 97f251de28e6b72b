//! Query pre-processing steps.
//!
//! A pre-processor is anything that takes a `CaseQuery` and returns one;
//! plain functions and closures qualify. The pipeline applies them in order
//! before retrieval.

use crate::domain::CaseQuery;

/// A single query rewrite step
pub trait QueryTransform: Send + Sync {
    fn apply(&self, query: CaseQuery) -> CaseQuery;
}

impl<F> QueryTransform for F
where
    F: Fn(CaseQuery) -> CaseQuery + Send + Sync,
{
    fn apply(&self, query: CaseQuery) -> CaseQuery {
        self(query)
    }
}

/// Collapse runs of whitespace in the query text
pub fn normalize_whitespace(mut query: CaseQuery) -> CaseQuery {
    query.text = query.text.split_whitespace().collect::<Vec<_>>().join(" ");
    query
}

/// Run `query` through every transform in order
pub fn apply_all(transforms: &[Box<dyn QueryTransform>], query: CaseQuery) -> CaseQuery {
    transforms.iter().fold(query, |q, t| t.apply(q))
}

//! Case queries, retrieved context and generated suggestions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request to solve a support case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseQuery {
    /// The raw case description or user question
    pub text: String,

    /// Number of context documents to retrieve (also the default suggestion count)
    pub k: u32,

    /// Consultant asking for suggestions (if known)
    #[serde(default, alias = "requester_id", skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<String>,

    /// Specialization used to narrow retrieval
    #[serde(default, alias = "specialization", skip_serializing_if = "Option::is_none")]
    pub speciality: Option<String>,
}

impl CaseQuery {
    /// Create a query with no requester or specialization
    pub fn new(text: impl Into<String>, k: u32) -> Self {
        Self {
            text: text.into(),
            k,
            consultant_id: None,
            speciality: None,
        }
    }

    pub fn with_consultant(mut self, consultant_id: impl Into<String>) -> Self {
        self.consultant_id = Some(consultant_id.into());
        self
    }

    pub fn with_speciality(mut self, speciality: impl Into<String>) -> Self {
        self.speciality = Some(speciality.into());
        self
    }

    /// Reject queries that must never reach the pipeline
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        if self.k < 1 {
            return Err(ValidationError::CountTooSmall {
                field: "k",
                actual: self.k,
            });
        }
        Ok(())
    }
}

/// Validate an explicit suggestion count override
pub fn validate_requested_count(requested: Option<u32>) -> Result<(), ValidationError> {
    match requested {
        Some(n) if n < 1 => Err(ValidationError::CountTooSmall {
            field: "n",
            actual: n,
        }),
        _ => Ok(()),
    }
}

/// Input rejected before the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Case text must not be empty")]
    EmptyText,

    #[error("'{field}' must be at least 1, got {actual}")]
    CountTooSmall { field: &'static str, actual: u32 },
}

/// A context snippet returned by the retrieval service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub id: String,
    pub snippet: String,
}

impl ContextDocument {
    pub fn new(id: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            snippet: snippet.into(),
        }
    }
}

/// One candidate solution, serialized as a bare string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suggestion {
    pub text: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Suggestion {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Suggestion {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// Ordered suggestions for a single case (presentation order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveResult {
    pub suggestions: Vec<Suggestion>,
}

impl SolveResult {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Suggestion texts in order
    pub fn texts(&self) -> Vec<&str> {
        self.suggestions.iter().map(Suggestion::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_deserializes_with_optional_fields_missing() {
        let query: CaseQuery =
            serde_json::from_str(r#"{"text": "patient has fever", "k": 3}"#).unwrap();

        assert_eq!(query.text, "patient has fever");
        assert_eq!(query.k, 3);
        assert!(query.consultant_id.is_none());
        assert!(query.speciality.is_none());
    }

    #[test]
    fn test_query_accepts_alias_field_names() {
        let query: CaseQuery = serde_json::from_str(
            r#"{"text": "t", "k": 1, "requester_id": "c-7", "specialization": "cardio"}"#,
        )
        .unwrap();

        assert_eq!(query.consultant_id.as_deref(), Some("c-7"));
        assert_eq!(query.speciality.as_deref(), Some("cardio"));
    }

    #[test]
    fn test_query_validation() {
        assert!(CaseQuery::new("fever", 1).validate().is_ok());
        assert_eq!(
            CaseQuery::new("fever", 0).validate(),
            Err(ValidationError::CountTooSmall {
                field: "k",
                actual: 0
            })
        );
        assert_eq!(
            CaseQuery::new("   ", 3).validate(),
            Err(ValidationError::EmptyText)
        );
    }

    #[test]
    fn test_requested_count_validation() {
        assert!(validate_requested_count(None).is_ok());
        assert!(validate_requested_count(Some(1)).is_ok());
        assert!(validate_requested_count(Some(0)).is_err());
    }

    #[test]
    fn test_suggestion_serializes_as_plain_string() {
        let result = SolveResult::new(vec!["Rest".into(), "Fluids".into()]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json, serde_json::json!({"suggestions": ["Rest", "Fluids"]}));
    }
}

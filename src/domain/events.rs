//! Integration events exchanged over the message broker.
//!
//! Both directions use a MassTransit-style envelope: the payload lives under
//! the `message` key, alongside broker metadata we mostly ignore on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::query::Suggestion;

/// URN of the outbound event type (MassTransit `messageType` convention)
pub const SOLUTIONS_GENERATED_MESSAGE_TYPE: &str =
    "urn:message:Contracts.Shared.Events:CaseSolutionsGenerated";

/// A case was assigned to a consultant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseAssigned {
    pub case_id: String,
    pub consultant_id: String,
}

/// Suggestions were generated for a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionsGenerated {
    pub case_id: String,
    pub solutions: Vec<Suggestion>,
}

impl SolutionsGenerated {
    pub fn new(case_id: impl Into<String>, solutions: Vec<Suggestion>) -> Self {
        Self {
            case_id: case_id.into(),
            solutions,
        }
    }
}

/// Message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Unique id of this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,

    /// Message type URNs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_type: Vec<String>,

    /// When the message was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<DateTime<Utc>>,

    /// The actual payload
    pub message: T,
}

impl<T> Envelope<T> {
    /// Wrap a payload for publishing, stamping id and send time
    pub fn wrap(message: T, message_type: &str) -> Self {
        Self {
            message_id: Some(Uuid::new_v4()),
            message_type: vec![message_type.to_string()],
            sent_time: Some(Utc::now()),
            message,
        }
    }
}

impl Envelope<SolutionsGenerated> {
    pub fn solutions_generated(event: SolutionsGenerated) -> Self {
        Self::wrap(event, SOLUTIONS_GENERATED_MESSAGE_TYPE)
    }
}

/// Errors decoding an inbound message body
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Message body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Message envelope has no 'message' field")]
    MissingMessage,

    #[error("Message payload does not match CaseAssigned: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

/// Decode a raw `CaseAssigned` delivery body
pub fn decode_case_assigned(body: &[u8]) -> Result<CaseAssigned, EnvelopeError> {
    let raw: serde_json::Value = serde_json::from_slice(body).map_err(EnvelopeError::InvalidJson)?;
    let payload = raw
        .get("message")
        .cloned()
        .ok_or(EnvelopeError::MissingMessage)?;

    serde_json::from_value(payload).map_err(EnvelopeError::InvalidPayload)
}

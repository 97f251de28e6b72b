//! OpenAI-compatible chat completions adapter.
//!
//! Works against any server exposing `POST {base}/chat/completions`
//! (LM Studio, vLLM, llama.cpp server, OpenAI itself).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ensure_success, join_url, Generator};
use crate::core::extract::extract_suggestions;
use crate::domain::{ContextDocument, Suggestion};

const SYSTEM_PROMPT: &str = "You are a knowledgeable consultant.";

/// Chat message sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generation backed by a chat completions endpoint
pub struct LlmGenerator {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LlmGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the conversation for a case and its context
    pub fn build_messages(case_text: &str, docs: &[ContextDocument], count: u32) -> Vec<ChatMessage> {
        let context = docs
            .iter()
            .map(|d| format!("— {}", d.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "CONTEXT:\n{}\n\nCase: {}\n\nPlease generate {} distinct solution suggestions.\nReturn them as a JSON array of strings.",
            context, case_text, count
        );

        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
    }

    /// Send a conversation and return the first choice's text
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = join_url(&self.base_url, "chat/completions");
        let payload = ChatRequest {
            model: &self.model,
            messages,
        };

        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach LLM at {}", url))?;
        let response = ensure_success(response, "LLM").await?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("LLM response has no message content")
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(
        &self,
        case_text: &str,
        docs: &[ContextDocument],
        count: u32,
    ) -> Result<Vec<Suggestion>> {
        let messages = Self::build_messages(case_text, docs, count);
        let content = self.chat(&messages).await?;
        debug!(model = %self.model, chars = content.len(), "Model responded");

        Ok(extract_suggestions(&content))
    }
}

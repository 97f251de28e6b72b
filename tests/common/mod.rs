//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use case_solver::adapters::{CaseDetails, CaseStore, EventPublisher, Generator, Retriever};
use case_solver::core::extract_suggestions;
use case_solver::{CaseQuery, ContextDocument, SolutionsGenerated, SolvePipeline, Suggestion};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Retriever returning canned documents or a canned error
#[derive(Default)]
pub struct FakeRetriever {
    docs: Vec<ContextDocument>,
    error: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<CaseQuery>>,
}

impl FakeRetriever {
    pub fn returning(docs: Vec<ContextDocument>) -> Self {
        Self {
            docs,
            ..Default::default()
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<CaseQuery> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    fn name(&self) -> &str {
        "fake-retriever"
    }

    async fn retrieve(&self, query: &CaseQuery) -> Result<Vec<ContextDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(query.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.error {
            Some(e) => anyhow::bail!("{}", e),
            None => Ok(self.docs.clone()),
        }
    }
}

/// One recorded generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub case_text: String,
    pub docs: Vec<ContextDocument>,
    pub count: u32,
}

/// Generator that runs canned raw model text through the extraction policy
#[derive(Default)]
pub struct FakeGenerator {
    raw: String,
    error: Option<String>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl FakeGenerator {
    /// Respond with raw model text
    pub fn responding(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            ..Default::default()
        }
    }

    /// Respond with a clean JSON array of the given suggestions
    pub fn suggesting(items: &[&str]) -> Self {
        Self::responding(&serde_json::to_string(items).unwrap())
    }

    pub fn failing(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn name(&self) -> &str {
        "fake-generator"
    }

    async fn generate(
        &self,
        case_text: &str,
        docs: &[ContextDocument],
        count: u32,
    ) -> Result<Vec<Suggestion>> {
        self.calls.lock().unwrap().push(GenerateCall {
            case_text: case_text.to_string(),
            docs: docs.to_vec(),
            count,
        });

        match &self.error {
            Some(e) => anyhow::bail!("{}", e),
            None => Ok(extract_suggestions(&self.raw)),
        }
    }
}

/// In-memory case store recording posted suggestions
#[derive(Default)]
pub struct FakeCaseStore {
    description: String,
    fail_get: bool,
    fail_post: bool,
    fetched: Mutex<Vec<String>>,
    posted: Mutex<Vec<(String, Vec<Suggestion>)>>,
}

impl FakeCaseStore {
    pub fn with_description(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn failing_get() -> Self {
        Self {
            fail_get: true,
            ..Default::default()
        }
    }

    pub fn failing_post(description: &str) -> Self {
        Self {
            description: description.to_string(),
            fail_post: true,
            ..Default::default()
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<(String, Vec<Suggestion>)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaseStore for FakeCaseStore {
    async fn get_case(&self, case_id: &str) -> Result<CaseDetails> {
        self.fetched.lock().unwrap().push(case_id.to_string());
        if self.fail_get {
            anyhow::bail!("case service returned 404 Not Found");
        }
        Ok(CaseDetails {
            description: self.description.clone(),
        })
    }

    async fn post_suggestions(&self, case_id: &str, suggestions: &[Suggestion]) -> Result<()> {
        if self.fail_post {
            anyhow::bail!("case service returned 503 Service Unavailable");
        }
        self.posted
            .lock()
            .unwrap()
            .push((case_id.to_string(), suggestions.to_vec()));
        Ok(())
    }
}

/// Publisher recording events instead of sending them
#[derive(Default)]
pub struct FakePublisher {
    fail: bool,
    published: Mutex<Vec<SolutionsGenerated>>,
}

impl FakePublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<SolutionsGenerated> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn publish_solutions(&self, event: &SolutionsGenerated) -> Result<()> {
        if self.fail {
            anyhow::bail!("channel closed");
        }
        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn pipeline(retriever: &Arc<FakeRetriever>, generator: &Arc<FakeGenerator>) -> SolvePipeline {
    SolvePipeline::new(
        Arc::clone(retriever) as Arc<dyn Retriever>,
        Arc::clone(generator) as Arc<dyn Generator>,
        TEST_TIMEOUT,
    )
}

pub fn two_docs() -> Vec<ContextDocument> {
    vec![
        ContextDocument::new("doc-1", "Fever is often viral"),
        ContextDocument::new("doc-2", "Hydration helps recovery"),
    ]
}

pub fn texts(suggestions: &[Suggestion]) -> Vec<&str> {
    suggestions.iter().map(Suggestion::as_str).collect()
}

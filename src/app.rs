//! Component wiring.
//!
//! Builds every collaborator from `Settings` and hands them to the pipeline
//! and event handler explicitly.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::adapters::{
    http_client, AmqpPublisher, EmbeddingRetriever, HttpCaseStore, LlmGenerator,
};
use crate::config::Settings;
use crate::core::{normalize_whitespace, CaseAssignedHandler, SolvePipeline};

/// Build the solve pipeline with its HTTP collaborators
pub fn build_pipeline(settings: &Settings) -> Result<SolvePipeline> {
    let client = http_client(settings.request_timeout())?;

    let retriever = EmbeddingRetriever::new(
        settings.retrieval.base_url.clone(),
        settings.retrieval.token.clone(),
        client.clone(),
    );
    let generator = LlmGenerator::new(
        settings.llm.base_url.clone(),
        settings.llm.model.clone(),
        settings.llm.api_key.clone(),
        client,
    );

    let mut pipeline = SolvePipeline::new(
        Arc::new(retriever),
        Arc::new(generator),
        settings.request_timeout(),
    );
    if settings.pipeline.normalize_whitespace {
        pipeline = pipeline.with_pre_processor(normalize_whitespace);
    }

    info!(
        retrieval = %settings.retrieval.base_url,
        llm = %settings.llm.base_url,
        model = %settings.llm.model,
        timeout_s = settings.pipeline.request_timeout_seconds,
        "Pipeline ready"
    );

    Ok(pipeline)
}

/// Build the CaseAssigned handler; connects the event publisher
pub async fn build_handler(
    settings: &Settings,
    pipeline: Arc<SolvePipeline>,
) -> Result<CaseAssignedHandler> {
    let client = http_client(settings.request_timeout())?;
    let case_store = HttpCaseStore::new(settings.case_service.base_url.clone(), client);
    let publisher = AmqpPublisher::connect(&settings.amqp).await?;

    Ok(CaseAssignedHandler::new(Arc::new(case_store), Arc::new(publisher), pipeline)
        .with_default_count(settings.pipeline.event_suggestion_count))
}

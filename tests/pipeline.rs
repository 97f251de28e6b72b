//! Solve Pipeline Integration Tests
//!
//! Sequencing, stage-tagged failures, count handling and pre-processing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use case_solver::core::normalize_whitespace;
use case_solver::{CaseQuery, SolveError, SolvePipeline, Stage};
use common::{pipeline, texts, two_docs, FakeGenerator, FakeRetriever};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_fever_scenario() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));
    let generator = Arc::new(FakeGenerator::responding(
        "```json\n[\"Rest and fluids\",\"See a doctor\"]\n```",
    ));

    let result = assert_ok!(
        pipeline(&retriever, &generator)
            .solve(&CaseQuery::new("patient has fever", 3), None)
            .await
    );

    assert_eq!(texts(&result.suggestions), vec!["Rest and fluids", "See a doctor"]);

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].case_text, "patient has fever");
    assert_eq!(calls[0].docs, two_docs());
    assert_eq!(calls[0].count, 3);
}

#[tokio::test]
async fn test_retrieval_failure_skips_generation() {
    let retriever = Arc::new(FakeRetriever::failing("connection refused"));
    let generator = Arc::new(FakeGenerator::suggesting(&["never"]));

    let err = assert_err!(
        pipeline(&retriever, &generator)
            .solve(&CaseQuery::new("printer jams", 2), None)
            .await
    );

    assert_eq!(err.stage(), Stage::Retrieval);
    assert!(err.to_string().contains("retrieval"));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(retriever.calls(), 1);
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn test_generation_failure_is_tagged() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));
    let generator = Arc::new(FakeGenerator::failing("LLM returned 500"));

    let err = assert_err!(
        pipeline(&retriever, &generator)
            .solve(&CaseQuery::new("printer jams", 2), None)
            .await
    );

    assert!(matches!(
        err,
        SolveError::UpstreamUnavailable {
            stage: Stage::Generation,
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_generation_is_a_generation_failure() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));
    let generator = Arc::new(FakeGenerator::responding("<think>no idea</think>"));

    let err = assert_err!(
        pipeline(&retriever, &generator)
            .solve(&CaseQuery::new("printer jams", 2), None)
            .await
    );
    assert_eq!(err.stage(), Stage::Generation);
}

#[tokio::test]
async fn test_requested_count_overrides_k() {
    let retriever = Arc::new(FakeRetriever::returning(vec![]));
    let generator = Arc::new(FakeGenerator::suggesting(&["a"]));
    let pipeline = pipeline(&retriever, &generator);

    pipeline.solve(&CaseQuery::new("case", 7), Some(1)).await.unwrap();
    pipeline.solve(&CaseQuery::new("case", 7), None).await.unwrap();

    let counts: Vec<u32> = generator.calls().iter().map(|c| c.count).collect();
    assert_eq!(counts, vec![1, 7]);
    // Retrieval always uses k
    assert!(retriever.seen().iter().all(|q| q.k == 7));
}

#[tokio::test]
async fn test_count_mismatch_passes_through() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));

    let under = Arc::new(FakeGenerator::suggesting(&["one", "two"]));
    let result = pipeline(&retriever, &under)
        .solve(&CaseQuery::new("case", 3), None)
        .await
        .unwrap();
    assert_eq!(result.len(), 2);

    let over = Arc::new(FakeGenerator::suggesting(&["1", "2", "3", "4"]));
    let result = pipeline(&retriever, &over)
        .solve(&CaseQuery::new("case", 3), None)
        .await
        .unwrap();
    assert_eq!(texts(&result.suggestions), vec!["1", "2", "3", "4"]);
}

#[tokio::test]
async fn test_plain_text_output_becomes_single_suggestion() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));
    let generator = Arc::new(FakeGenerator::responding(
        "  Restart the print spooler service.\n",
    ));

    let result = pipeline(&retriever, &generator)
        .solve(&CaseQuery::new("printer jams", 3), None)
        .await
        .unwrap();
    assert_eq!(
        texts(&result.suggestions),
        vec!["Restart the print spooler service."]
    );
}

#[tokio::test]
async fn test_pre_processors_shape_retrieval_but_not_generation() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));
    let generator = Arc::new(FakeGenerator::suggesting(&["ok"]));

    let pipeline = pipeline(&retriever, &generator)
        .with_pre_processor(normalize_whitespace)
        .with_pre_processor(|mut q: CaseQuery| {
            q.speciality = Some("general".to_string());
            q
        });

    let query = CaseQuery::new("  patient   has\n fever ", 2);
    pipeline.solve(&query, None).await.unwrap();

    let seen = retriever.seen();
    assert_eq!(seen[0].text, "patient has fever");
    assert_eq!(seen[0].speciality.as_deref(), Some("general"));
    assert_eq!(generator.calls()[0].case_text, "  patient   has\n fever ");
}

#[tokio::test]
async fn test_slow_retrieval_times_out() {
    let retriever = Arc::new(FakeRetriever::slow(Duration::from_secs(10)));
    let generator = Arc::new(FakeGenerator::suggesting(&["never"]));

    let pipeline = SolvePipeline::new(retriever.clone(), generator.clone(), Duration::from_millis(50));

    let err = assert_err!(pipeline.solve(&CaseQuery::new("case", 1), None).await);
    assert_eq!(err.stage(), Stage::Retrieval);
    assert!(err.to_string().contains("timed out"));
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_solves_share_one_pipeline() {
    let retriever = Arc::new(FakeRetriever::returning(two_docs()));
    let generator = Arc::new(FakeGenerator::suggesting(&["shared"]));
    let pipeline = Arc::new(pipeline(&retriever, &generator));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                pipeline
                    .solve(&CaseQuery::new(format!("case {}", i), 1), None)
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(retriever.calls(), 8);
    assert_eq!(generator.calls().len(), 8);
}

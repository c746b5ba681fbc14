//! End-to-end document pipeline tests over a scripted provider.

use chapterloom::graph::{Alias, Entity, EntityType, KnowledgeGraph, MemoryGraph};
use chapterloom::pipeline::{Chapter, ChapterOutcome, NovelPipeline, PipelineConfig};
use llm::mock::MockProvider;
use llm::{AgentRole, LlmError};
use std::sync::Arc;

const STYLE_JSON: &str =
    r#"{"genres": ["mystery"], "tone": "Measured, gaslit dread.", "terminology": []}"#;

const EXTRACTION_JSON: &str = r#"{
    "entities": [
        {"name": "Klein", "type": "person", "description": "a detective",
         "suggested_translation": "克莱恩"},
        {"name": "Tingen", "type": "place"}
    ],
    "triplets": [
        {"subject": "Klein", "predicate": "LOCATED_IN", "object": "Tingen"}
    ]
}"#;

fn scripted_provider() -> Arc<MockProvider> {
    let mock = Arc::new(MockProvider::new());
    mock.set_default(AgentRole::LanguageDetector, "Chinese");
    mock.set_default(AgentRole::StyleArchitect, STYLE_JSON);
    mock.set_default(AgentRole::Extractor, EXTRACTION_JSON);
    mock.set_default(AgentRole::Translator, "Translated chapter.");
    mock.set_default(AgentRole::JuniorEditor, "approved response accepted");
    mock.set_default(AgentRole::FluencyEditor, "No changes.");
    mock
}

fn serial_config() -> PipelineConfig {
    PipelineConfig { max_concurrent_chapters: 1 }
}

#[tokio::test]
async fn document_flows_to_assembled_translation() {
    let mock = scripted_provider();
    let graph = Arc::new(MemoryGraph::new());
    let pipeline =
        NovelPipeline::new(mock.clone(), graph.clone()).with_config(serial_config());

    let report = pipeline
        .process_document(vec![
            Chapter::new(1, "克莱恩站在廷根的街头。"),
            Chapter::new(2, "克莱恩继续他的调查。"),
        ])
        .await
        .unwrap();

    assert_eq!(report.chapters.len(), 2);
    for chapter in &report.chapters {
        assert_eq!(chapter.outcome, ChapterOutcome::Done, "chapter {}", chapter.index);
    }
    assert_eq!(report.document, "Translated chapter.\n\nTranslated chapter.");

    // Setup ran once for the whole document.
    assert_eq!(mock.call_count(AgentRole::LanguageDetector), 1);
    assert_eq!(mock.call_count(AgentRole::StyleArchitect), 1);
    // Every chapter was extracted and translated.
    assert_eq!(mock.call_count(AgentRole::Extractor), 2);
    assert_eq!(mock.call_count(AgentRole::Translator), 2);

    // Ingestion populated the graph: Klein and Tingen, merged across
    // chapters by strong-alias equality.
    assert_eq!(graph.entity_count().await, 2);
    assert_eq!(graph.triplet_count().await, 2);
}

#[tokio::test]
async fn chapter_failure_is_partial_not_fatal() {
    let mock = scripted_provider();
    // First chapter extracts fine; the second hits a permanent API error.
    mock.enqueue(AgentRole::Extractor, EXTRACTION_JSON);
    mock.enqueue_err(
        AgentRole::Extractor,
        LlmError::Api { status: 400, message: "malformed".to_string() },
    );

    let graph = Arc::new(MemoryGraph::new());
    let pipeline = NovelPipeline::new(mock, graph).with_config(serial_config());

    let report = pipeline
        .process_document(vec![
            Chapter::new(1, "第一章。"),
            Chapter::new(2, "第二章。"),
        ])
        .await
        .unwrap();

    assert_eq!(report.chapters[0].outcome, ChapterOutcome::Done);
    match &report.chapters[1].outcome {
        ChapterOutcome::Failed(reason) => assert!(reason.contains("extract")),
        other => panic!("expected failure, got {other:?}"),
    }
    // Only the surviving chapter is assembled.
    assert_eq!(report.document, "Translated chapter.");
}

#[tokio::test]
async fn ambiguous_merge_downgrades_chapter_to_needs_review() {
    let mock = scripted_provider();
    mock.set_default(
        AgentRole::Extractor,
        r#"{"entities": [{"name": "Li", "type": "person"}], "triplets": []}"#,
    );

    let graph = Arc::new(MemoryGraph::new());
    // Two pre-existing entities are both strongly known as "Li".
    let mut wei = Entity::new("Li Wei", EntityType::Person, 1);
    wei.add_alias(Alias::strong("Li", 1));
    graph.upsert_entity(wei).await.unwrap();
    let mut na = Entity::new("Li Na", EntityType::Person, 1);
    na.add_alias(Alias::strong("Li", 1));
    graph.upsert_entity(na).await.unwrap();

    let pipeline = NovelPipeline::new(mock, graph).with_config(serial_config());
    let report = pipeline
        .process_document(vec![Chapter::new(3, "李走进房间。")])
        .await
        .unwrap();

    // Translation still completed, but the merge waits for a human.
    assert_eq!(report.chapters[0].outcome, ChapterOutcome::NeedsReview);
    assert!(!report.document.is_empty());

    let pending = pipeline.resolver().pending_reviews();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].candidates.len(), 2);
}

#[tokio::test]
async fn setup_failure_is_fatal_for_the_document() {
    let mock = scripted_provider();
    mock.set_default(AgentRole::LanguageDetector, "no idea");

    let pipeline = NovelPipeline::new(mock, Arc::new(MemoryGraph::new()));
    let err = pipeline
        .process_document(vec![Chapter::new(1, "text")])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("language"));
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let pipeline = NovelPipeline::new(
        scripted_provider(),
        Arc::new(MemoryGraph::new()),
    );
    let err = pipeline.process_document(Vec::new()).await.unwrap_err();
    assert!(err.to_string().contains("no chapters"));
}

#[tokio::test]
async fn locked_terms_annotate_subsequent_chapters() {
    let mock = scripted_provider();
    let graph = Arc::new(MemoryGraph::new());
    let pipeline = NovelPipeline::new(mock.clone(), graph).with_config(serial_config());

    pipeline
        .process_document(vec![
            Chapter::new(1, "Klein stood in the fog."),
            Chapter::new(2, "Klein kept walking."),
        ])
        .await
        .unwrap();

    // Chapter 1 locked Klein's rendering; chapter 2's translator prompt
    // carries the inline translation-memory annotation.
    let translator_prompts: Vec<String> = mock
        .calls()
        .into_iter()
        .filter(|c| c.role == AgentRole::Translator)
        .map(|c| c.prompt)
        .collect();
    assert_eq!(translator_prompts.len(), 2);
    assert!(
        translator_prompts[1].contains("克莱恩 [Translation Memory Klein]"),
        "second chapter prompt missing annotation: {}",
        translator_prompts[1]
    );
}

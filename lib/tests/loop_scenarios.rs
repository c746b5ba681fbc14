//! Scenario tests for the translation loop state machine.
//!
//! Every scenario drives a real orchestrator over a scripted provider, so
//! the rejection ceiling, the setup barrier, and failure handling are
//! exercised exactly as production wires them.

use chapterloom::orchestrate::{ChapterState, ChapterStatus, Orchestrator, MAX_REJECTIONS};
use chapterloom::style::{Genre, StyleGuide};
use chapterloom::language::Language;
use llm::mock::MockProvider;
use llm::{AgentRole, LlmError};
use std::sync::Arc;

const STYLE_JSON: &str =
    r#"{"genres": ["mystery"], "tone": "Measured, gaslit dread.", "terminology": []}"#;

fn ready_state() -> ChapterState {
    let mut state = ChapterState::new(1, "雾气弥漫。\n\n他推开了门。");
    state.language = Some(Language::Chinese);
    state.style = Some(Arc::new(StyleGuide {
        genres: vec![Genre::Mystery],
        tone: "Measured.".to_string(),
        terminology: Vec::new(),
    }));
    state
}

fn approve() -> &'static str {
    "approved response accepted - publishable as is."
}

#[tokio::test]
async fn two_rejections_then_accept() {
    let mock = Arc::new(MockProvider::new());
    mock.enqueue(AgentRole::Translator, "The fog spread.");
    mock.enqueue(AgentRole::JuniorEditor, "Reject: the register is flat.");
    mock.enqueue(AgentRole::Translator, "The fog crept outward.");
    mock.enqueue(AgentRole::JuniorEditor, "Reject: second paragraph drops a beat.");
    mock.enqueue(AgentRole::Translator, "The fog crept outward, swallowing the street.");
    mock.enqueue(AgentRole::JuniorEditor, approve());
    mock.enqueue(
        AgentRole::FluencyEditor,
        "<segment 0>\nFog crept outward, swallowing the street.\n</segment 0>",
    );

    let orchestrator = Orchestrator::new(mock.clone());
    let state = orchestrator.run(ready_state()).await.unwrap();

    assert_eq!(state.status, ChapterStatus::Done);
    assert_eq!(state.rejection_count, 2);
    assert_eq!(state.feedback_history.len(), 2);
    assert_eq!(state.feedback_history[0].round, 1);
    assert!(state.final_text.unwrap().contains("swallowing the street"));
    assert_eq!(mock.call_count(AgentRole::Translator), 3);
    assert_eq!(mock.call_count(AgentRole::JuniorEditor), 3);
    assert_eq!(mock.call_count(AgentRole::FluencyEditor), 1);
}

#[tokio::test]
async fn three_rejections_force_fluency_regardless_of_verdict() {
    let mock = Arc::new(MockProvider::new());
    // Reviewer rejects every draft it is shown.
    mock.set_default(AgentRole::JuniorEditor, "Reject: still not good enough.");
    mock.set_default(AgentRole::Translator, "Another draft.");
    mock.set_default(AgentRole::FluencyEditor, "No changes.");

    let orchestrator = Orchestrator::new(mock.clone());
    let state = orchestrator.run(ready_state()).await.unwrap();

    // The orchestrator, not the reviewer, ends the loop.
    assert_eq!(state.status, ChapterStatus::Done);
    assert_eq!(state.rejection_count, MAX_REJECTIONS);
    assert_eq!(state.feedback_history.len(), MAX_REJECTIONS as usize);
    // Ceiling reached after the third rejection: a fourth draft is written,
    // then feedback-check forces fluency without consulting the reviewer.
    assert_eq!(mock.call_count(AgentRole::Translator), 4);
    assert_eq!(mock.call_count(AgentRole::JuniorEditor), 3);
    assert_eq!(mock.call_count(AgentRole::FluencyEditor), 1);
}

#[tokio::test]
async fn accept_on_first_review_skips_the_loop() {
    let mock = Arc::new(MockProvider::new());
    mock.enqueue(AgentRole::Translator, "A clean first draft.");
    mock.enqueue(AgentRole::JuniorEditor, approve());
    mock.enqueue(AgentRole::FluencyEditor, "No changes.");

    let orchestrator = Orchestrator::new(mock.clone());
    let state = orchestrator.run(ready_state()).await.unwrap();

    assert_eq!(state.status, ChapterStatus::Done);
    assert_eq!(state.rejection_count, 0);
    assert!(state.feedback_history.is_empty());
    assert_eq!(state.final_text.as_deref(), Some("A clean first draft."));
}

#[tokio::test]
async fn setup_barrier_blocks_translation_until_both_resolve() {
    let mock = Arc::new(MockProvider::new());
    mock.enqueue(AgentRole::LanguageDetector, "Chinese");
    mock.enqueue(AgentRole::StyleArchitect, STYLE_JSON);
    mock.enqueue(AgentRole::Translator, "Draft.");
    mock.enqueue(AgentRole::JuniorEditor, approve());
    mock.enqueue(AgentRole::FluencyEditor, "No changes.");

    let orchestrator = Orchestrator::new(mock.clone());
    // Neither prerequisite present: both setup stages must run first.
    let state = orchestrator
        .run(ChapterState::new(1, "雾气弥漫。"))
        .await
        .unwrap();

    assert_eq!(state.status, ChapterStatus::Done);
    assert_eq!(state.language, Some(Language::Chinese));
    assert!(state.style.is_some());

    let detector = mock.first_call_index(AgentRole::LanguageDetector).unwrap();
    let stylist = mock.first_call_index(AgentRole::StyleArchitect).unwrap();
    let translator = mock.first_call_index(AgentRole::Translator).unwrap();
    assert!(translator > detector, "translation observed before language setup");
    assert!(translator > stylist, "translation observed before style setup");
    assert_eq!(mock.call_count(AgentRole::LanguageDetector), 1);
    assert_eq!(mock.call_count(AgentRole::StyleArchitect), 1);
}

#[tokio::test]
async fn permanent_translate_failure_marks_chapter_failed() {
    let mock = Arc::new(MockProvider::new());
    mock.enqueue_err(
        AgentRole::Translator,
        LlmError::Api { status: 400, message: "malformed request".to_string() },
    );

    let orchestrator = Orchestrator::new(mock);
    let state = orchestrator.run(ready_state()).await.unwrap();

    match &state.status {
        ChapterStatus::Failed(reason) => assert!(reason.contains("translate")),
        other => panic!("expected failed status, got {other:?}"),
    }
    // Last successful state preserved for diagnostics.
    assert!(state.language.is_some());
    assert!(state.translation.is_none());
    assert!(state.final_text.is_none());
}

#[tokio::test]
async fn failure_mid_loop_preserves_prior_draft() {
    let mock = Arc::new(MockProvider::new());
    mock.enqueue(AgentRole::Translator, "First draft.");
    mock.enqueue(AgentRole::JuniorEditor, "Reject: revise the opening.");
    mock.enqueue_err(
        AgentRole::Translator,
        LlmError::Exhausted { attempts: 3, last: "rate limited".to_string() },
    );

    let orchestrator = Orchestrator::new(mock);
    let state = orchestrator.run(ready_state()).await.unwrap();

    assert!(matches!(state.status, ChapterStatus::Failed(_)));
    assert_eq!(state.translation.as_deref(), Some("First draft."));
    assert_eq!(state.rejection_count, 1);
    assert_eq!(state.feedback_history.len(), 1);
}

#[tokio::test]
async fn unresolvable_language_is_fatal_with_diagnostic() {
    let mock = Arc::new(MockProvider::new());
    mock.enqueue(AgentRole::LanguageDetector, "I am not sure, sorry.");
    mock.enqueue(AgentRole::StyleArchitect, STYLE_JSON);

    let orchestrator = Orchestrator::new(mock);
    let err = orchestrator
        .run(ChapterState::new(1, "text"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("language"));
}

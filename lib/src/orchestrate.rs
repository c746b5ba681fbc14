//! The per-chapter orchestration state machine.
//!
//! One chapter runs `ENTRY → (setup) → TRANSLATE → FEEDBACK_CHECK →
//! JUNIOR_REVIEW → ... → FLUENCY_EDIT → DONE`, with `FAILED` as the
//! out-of-band absorbing state. The transition function is pure and lives in
//! [`next_stage`]; node execution lives in [`Orchestrator::run`]. The
//! orchestrator — never the reviewer — enforces the rejection ceiling, so a
//! reviewer that rejects forever still terminates in at most
//! [`MAX_REJECTIONS`] loops.

use crate::agents::{FluencyEditor, JuniorEditor, TranslationJob, Translator};
use crate::error::{OrchestrateError, OrchestrateResult};
use crate::language::{Language, LanguageDetector, LlmLanguageDetector};
use crate::style::{StyleArchitect, StyleGuide};
use llm::LlmProvider;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Hard ceiling on reviewer rejections per chapter. Reaching it forces the
/// next `FEEDBACK_CHECK` to fluency-edit regardless of the verdict.
pub const MAX_REJECTIONS: u32 = 3;

/// The orchestration stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Re-evaluated until both setup prerequisites hold
    Entry,
    /// Detect the source language
    LanguageDetect,
    /// Compose the style guide
    StyleSetup,
    /// Produce a candidate translation
    Translate,
    /// Gate: ceiling or prior accept goes straight to fluency
    FeedbackCheck,
    /// Reviewer verdict and feedback
    JuniorReview,
    /// Final blind polish
    FluencyEdit,
    /// Terminal success
    Done,
    /// Out-of-band absorbing failure state
    Failed,
}

impl Stage {
    /// Stable string form for logs and the workflow graph description
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Entry => "entry",
            Stage::LanguageDetect => "language_detect",
            Stage::StyleSetup => "style_setup",
            Stage::Translate => "translate",
            Stage::FeedbackCheck => "feedback_check",
            Stage::JuniorReview => "junior_review",
            Stage::FluencyEdit => "fluency_edit",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a chapter currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterStatus {
    /// Created, not yet run
    Pending,
    /// Inside the state machine
    Translating,
    /// Terminal success
    Done,
    /// Terminal failure with its diagnostic
    Failed(String),
}

/// One reviewer feedback entry, in rejection order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    /// 1-based rejection round the feedback belongs to
    pub round: u32,
    /// The feedback text
    pub text: String,
}

/// Per-chapter, per-run translation state.
///
/// Owned and mutated exclusively by the orchestrator. Invariant:
/// `rejection_count <= MAX_REJECTIONS`.
#[derive(Debug, Clone)]
pub struct ChapterState {
    /// Chapter index within the document
    pub chapter: u32,
    /// Raw source text
    pub source: String,
    /// Source text with translation-memory annotations applied
    pub annotated: Option<String>,
    /// Detected source language
    pub language: Option<Language>,
    /// The per-document style guide
    pub style: Option<Arc<StyleGuide>>,
    /// Latest candidate translation
    pub translation: Option<String>,
    /// Reviewer feedback, ordered by rejection round
    pub feedback_history: Vec<FeedbackEntry>,
    /// Rejections so far; never exceeds [`MAX_REJECTIONS`]
    pub rejection_count: u32,
    /// Most recent reviewer verdict
    pub last_verdict: Option<bool>,
    /// Fluency-edited final text
    pub final_text: Option<String>,
    /// Current status
    pub status: ChapterStatus,
}

impl ChapterState {
    /// Create the state for a freshly ingested chapter
    pub fn new(chapter: u32, source: impl Into<String>) -> Self {
        Self {
            chapter,
            source: source.into(),
            annotated: None,
            language: None,
            style: None,
            translation: None,
            feedback_history: Vec::new(),
            rejection_count: 0,
            last_verdict: None,
            final_text: None,
            status: ChapterStatus::Pending,
        }
    }

    /// The text the translator works from: annotated if available
    pub fn text_for_translation(&self) -> &str {
        self.annotated.as_deref().unwrap_or(&self.source)
    }

    /// The most recent feedback entry
    pub fn latest_feedback(&self) -> Option<&FeedbackEntry> {
        self.feedback_history.last()
    }
}

/// The pure transition function `(stage, state) → stage`.
///
/// Independently testable from node execution; [`Orchestrator::run`] only
/// ever moves along edges this function defines.
pub fn next_stage(current: Stage, state: &ChapterState) -> Stage {
    match current {
        Stage::Entry => {
            if state.language.is_none() {
                Stage::LanguageDetect
            } else if state.style.is_none() {
                Stage::StyleSetup
            } else {
                Stage::Translate
            }
        }
        // Setup stages return to entry, which re-evaluates until both
        // prerequisites are satisfied.
        Stage::LanguageDetect | Stage::StyleSetup => Stage::Entry,
        Stage::Translate => Stage::FeedbackCheck,
        Stage::FeedbackCheck => {
            if state.rejection_count >= MAX_REJECTIONS || state.last_verdict == Some(true) {
                Stage::FluencyEdit
            } else {
                Stage::JuniorReview
            }
        }
        Stage::JuniorReview => {
            if state.last_verdict == Some(true) {
                Stage::FluencyEdit
            } else {
                Stage::Translate
            }
        }
        Stage::FluencyEdit => Stage::Done,
        Stage::Done => Stage::Done,
        Stage::Failed => Stage::Failed,
    }
}

/// Runs chapters through the state machine
pub struct Orchestrator {
    detector: Arc<dyn LanguageDetector>,
    stylist: StyleArchitect,
    translator: Translator,
    junior: JuniorEditor,
    fluency: FluencyEditor,
}

impl Orchestrator {
    /// Create an orchestrator with every agent backed by `provider`
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            detector: Arc::new(LlmLanguageDetector::new(provider.clone())),
            stylist: StyleArchitect::new(provider.clone()),
            translator: Translator::new(provider.clone()),
            junior: JuniorEditor::new(provider.clone()),
            fluency: FluencyEditor::new(provider),
        }
    }

    /// Replace the language detection capability
    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Run both setup stages concurrently and barrier on the pair.
    ///
    /// No translator invocation can observe a missing language or style
    /// guide: this join is the only path into `TRANSLATE` when either is
    /// absent. A setup failure is fatal for the document, diagnosed with the
    /// missing field's name.
    pub async fn prepare(&self, sample: &str) -> OrchestrateResult<(Language, Arc<StyleGuide>)> {
        let (language, style) =
            tokio::join!(self.detector.detect(sample), self.stylist.compose(sample));

        let language = language.map_err(|e| {
            error!(error = %e, "language detection failed");
            OrchestrateError::SetupIncomplete { field: "language" }
        })?;
        let style = style.map_err(|e| {
            error!(error = %e, "style guide composition failed");
            OrchestrateError::SetupIncomplete { field: "style guide" }
        })?;
        Ok((language, Arc::new(style)))
    }

    /// Drive one chapter from its current state to a terminal state.
    ///
    /// Deterministic given deterministic node outputs. Node failures inside
    /// the translation loop mark the chapter failed and preserve the last
    /// successful state for diagnostics; setup failures escalate as
    /// document-fatal errors.
    pub async fn run(&self, mut state: ChapterState) -> OrchestrateResult<ChapterState> {
        state.status = ChapterStatus::Translating;
        let mut stage = Stage::Entry;

        loop {
            info!(
                chapter = state.chapter,
                stage = %stage,
                rejections = state.rejection_count,
                "entering stage"
            );

            stage = match stage {
                Stage::Entry => next_stage(Stage::Entry, &state),

                Stage::LanguageDetect => {
                    if state.style.is_none() {
                        // Both prerequisites missing: run the setup nodes
                        // concurrently, barrier on the pair.
                        let (language, style) = self.prepare(&state.source).await?;
                        state.language = Some(language);
                        state.style = Some(style);
                    } else {
                        let language = self.detector.detect(&state.source).await.map_err(|e| {
                            error!(error = %e, "language detection failed");
                            OrchestrateError::SetupIncomplete { field: "language" }
                        })?;
                        state.language = Some(language);
                    }
                    next_stage(Stage::LanguageDetect, &state)
                }

                Stage::StyleSetup => {
                    let style = self.stylist.compose(&state.source).await.map_err(|e| {
                        error!(error = %e, "style guide composition failed");
                        OrchestrateError::SetupIncomplete { field: "style guide" }
                    })?;
                    state.style = Some(Arc::new(style));
                    next_stage(Stage::StyleSetup, &state)
                }

                Stage::Translate => {
                    let language = state
                        .language
                        .ok_or(OrchestrateError::SetupIncomplete { field: "language" })?;
                    let style = state
                        .style
                        .clone()
                        .ok_or(OrchestrateError::SetupIncomplete { field: "style guide" })?;
                    let text = state.text_for_translation().to_string();
                    let prior = state.translation.clone();
                    let feedback = state.latest_feedback().map(|f| f.text.clone());

                    let job = TranslationJob {
                        text: &text,
                        language,
                        style: &style,
                        prior: prior.as_deref(),
                        feedback: feedback.as_deref(),
                    };
                    match self.translator.translate(job).await {
                        Ok(translation) => {
                            state.translation = Some(translation);
                            next_stage(Stage::Translate, &state)
                        }
                        Err(e) => return Ok(fail(state, "translate", e)),
                    }
                }

                Stage::FeedbackCheck => next_stage(Stage::FeedbackCheck, &state),

                Stage::JuniorReview => {
                    let source = state.text_for_translation().to_string();
                    let translation = state.translation.clone().unwrap_or_default();
                    match self.junior.review(&source, &translation).await {
                        Ok(review) => {
                            state.last_verdict = Some(review.approved);
                            if !review.approved {
                                state.rejection_count += 1;
                                state.feedback_history.push(FeedbackEntry {
                                    round: state.rejection_count,
                                    text: review.feedback,
                                });
                            }
                            next_stage(Stage::JuniorReview, &state)
                        }
                        Err(e) => return Ok(fail(state, "junior_review", e)),
                    }
                }

                Stage::FluencyEdit => {
                    let translation = state.translation.clone().unwrap_or_default();
                    match self.fluency.polish(&translation).await {
                        Ok(final_text) => {
                            state.final_text = Some(final_text);
                            next_stage(Stage::FluencyEdit, &state)
                        }
                        Err(e) => return Ok(fail(state, "fluency_edit", e)),
                    }
                }

                Stage::Done => {
                    state.status = ChapterStatus::Done;
                    info!(
                        chapter = state.chapter,
                        rejections = state.rejection_count,
                        "chapter done"
                    );
                    return Ok(state);
                }

                Stage::Failed => return Ok(state),
            };
        }
    }
}

/// Mark a chapter failed, preserving the last successful state for
/// diagnostics
fn fail(mut state: ChapterState, node: &str, error: llm::LlmError) -> ChapterState {
    warn!(
        chapter = state.chapter,
        node,
        error = %error,
        "chapter aborted"
    );
    state.status = ChapterStatus::Failed(format!("{node}: {error}"));
    state
}

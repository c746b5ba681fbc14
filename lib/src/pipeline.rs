//! Document ingestion and the per-chapter processing pipeline.
//!
//! A document is an ordered sequence of chapters. Setup (language, style
//! guide) runs once per document with a barrier; each chapter then flows
//! through extraction → resolution → graph writes → annotation → the
//! translation loop. Chapter work overlaps up to a configurable concurrency
//! limit, and a chapter that fails permanently does not take the document
//! down with it.
//!
//! Cancellation is scoped per run: dropping the future returned by
//! [`NovelPipeline::process_document`] aborts that run's in-flight chapter
//! tasks and nothing else.

use crate::annotate::{AnnotatedText, TermAnnotator};
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{ChapterExtractor, Extraction};
use crate::graph::{KnowledgeGraph, Predicate};
use crate::language::Language;
use crate::orchestrate::{ChapterState, ChapterStatus, Orchestrator, Stage};
use crate::resolve::EntityResolver;
use crate::style::StyleGuide;
use llm::LlmProvider;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// One chapter of input
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Position within the document
    pub index: u32,
    /// Raw chapter text
    pub text: String,
}

impl Chapter {
    /// Create a chapter
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }
}

/// The user-visible outcome of one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    /// Translated and fluency-edited
    Done,
    /// Aborted with a diagnostic; the rest of the document continued
    Failed(String),
    /// Translated, but an ambiguous entity merge awaits manual review
    NeedsReview,
}

impl ChapterOutcome {
    /// Stable string form for reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterOutcome::Done => "done",
            ChapterOutcome::Failed(_) => "failed",
            ChapterOutcome::NeedsReview => "needs-review",
        }
    }
}

/// Per-chapter report
#[derive(Debug, Clone)]
pub struct ChapterReport {
    /// Chapter index
    pub index: u32,
    /// Outcome
    pub outcome: ChapterOutcome,
    /// Rejections the review loop recorded
    pub rejection_count: u32,
    /// Feedback entries accumulated
    pub feedback_rounds: usize,
}

/// A directed edge in the workflow description
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowEdge {
    /// Source stage
    pub from: String,
    /// Target stage
    pub to: String,
    /// Optional predicate label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Node/edge description of the workflow stages. Rendering is out of scope;
/// this is data for whatever draws the diagram.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowGraph {
    /// Stage names
    pub nodes: Vec<String>,
    /// Transitions with their predicates
    pub edges: Vec<WorkflowEdge>,
}

/// The stage graph the orchestrator moves along
pub fn workflow_graph() -> WorkflowGraph {
    let nodes = [
        Stage::Entry,
        Stage::LanguageDetect,
        Stage::StyleSetup,
        Stage::Translate,
        Stage::FeedbackCheck,
        Stage::JuniorReview,
        Stage::FluencyEdit,
        Stage::Done,
        Stage::Failed,
    ]
    .iter()
    .map(|s| s.as_str().to_string())
    .collect();

    let edge = |from: Stage, to: Stage, label: Option<&str>| WorkflowEdge {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
        label: label.map(String::from),
    };

    WorkflowGraph {
        nodes,
        edges: vec![
            edge(Stage::Entry, Stage::LanguageDetect, Some("language missing")),
            edge(Stage::Entry, Stage::StyleSetup, Some("style guide missing")),
            edge(Stage::Entry, Stage::Translate, Some("prerequisites ready")),
            edge(Stage::LanguageDetect, Stage::Entry, None),
            edge(Stage::StyleSetup, Stage::Entry, None),
            edge(Stage::Translate, Stage::FeedbackCheck, None),
            edge(Stage::FeedbackCheck, Stage::JuniorReview, Some("under ceiling")),
            edge(
                Stage::FeedbackCheck,
                Stage::FluencyEdit,
                Some("ceiling reached or accepted"),
            ),
            edge(Stage::JuniorReview, Stage::FluencyEdit, Some("accept")),
            edge(Stage::JuniorReview, Stage::Translate, Some("reject")),
            edge(Stage::FluencyEdit, Stage::Done, None),
        ],
    }
}

/// Document-level report: per-chapter outcomes, the assembled translation,
/// and the workflow description
#[derive(Debug)]
pub struct DocumentReport {
    /// Per-chapter reports, in document order
    pub chapters: Vec<ChapterReport>,
    /// Accepted, fluency-edited chapters concatenated in order
    pub document: String,
    /// The stage graph
    pub workflow: WorkflowGraph,
}

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How many chapters may be in flight at once
    pub max_concurrent_chapters: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_concurrent_chapters: 4 }
    }
}

/// Processes whole documents chapter by chapter
pub struct NovelPipeline {
    graph: Arc<dyn KnowledgeGraph>,
    resolver: Arc<EntityResolver>,
    annotator: Arc<TermAnnotator>,
    extractor: Arc<ChapterExtractor>,
    orchestrator: Arc<Orchestrator>,
    config: PipelineConfig,
}

impl NovelPipeline {
    /// Create a pipeline with every agent backed by `provider` and all
    /// graph-derived components over `graph`
    pub fn new(provider: Arc<dyn LlmProvider>, graph: Arc<dyn KnowledgeGraph>) -> Self {
        Self {
            resolver: Arc::new(EntityResolver::new(graph.clone())),
            annotator: Arc::new(TermAnnotator::new(graph.clone())),
            extractor: Arc::new(ChapterExtractor::new(provider.clone())),
            orchestrator: Arc::new(Orchestrator::new(provider)),
            graph,
            config: PipelineConfig::default(),
        }
    }

    /// Replace the orchestrator (custom detector, test doubles)
    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = Arc::new(orchestrator);
        self
    }

    /// Set pipeline tuning
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The resolver, for inspecting the manual-review queue
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Process an ordered document and assemble the final translation.
    ///
    /// Setup runs once, up front, and is fatal for the document if it cannot
    /// complete. Chapters then run with bounded overlap; a chapter failure
    /// is recorded and the rest continue.
    pub async fn process_document(&self, chapters: Vec<Chapter>) -> PipelineResult<DocumentReport> {
        if chapters.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let (language, style) = self.orchestrator.prepare(&chapters[0].text).await?;
        info!(%language, chapters = chapters.len(), "document setup complete");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_chapters));
        let mut tasks: JoinSet<(u32, ChapterReport, Option<String>)> = JoinSet::new();

        for chapter in chapters {
            let semaphore = semaphore.clone();
            let graph = self.graph.clone();
            let resolver = self.resolver.clone();
            let annotator = self.annotator.clone();
            let extractor = self.extractor.clone();
            let orchestrator = self.orchestrator.clone();
            let style = style.clone();

            tasks.spawn(async move {
                // Closed semaphore only happens on shutdown; treat as abort.
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return failed_report(chapter.index, "pipeline shut down".to_string())
                    }
                };
                run_chapter(
                    chapter,
                    language,
                    style,
                    graph,
                    resolver,
                    annotator,
                    extractor,
                    orchestrator,
                )
                .await
            });
        }

        let mut reports = Vec::new();
        let mut outputs: Vec<(u32, String)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, report, final_text) =
                joined.map_err(|e| PipelineError::Join(e.to_string()))?;
            if let Some(text) = final_text {
                outputs.push((index, text));
            }
            reports.push(report);
        }

        // Ambiguous merges flagged during resolution downgrade their
        // chapters to needs-review.
        let flagged: Vec<u32> = self
            .resolver
            .pending_reviews()
            .iter()
            .map(|m| m.chapter)
            .collect();
        for report in &mut reports {
            if report.outcome == ChapterOutcome::Done && flagged.contains(&report.index) {
                report.outcome = ChapterOutcome::NeedsReview;
            }
        }

        reports.sort_by_key(|r| r.index);
        outputs.sort_by_key(|(index, _)| *index);
        let document = outputs
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(DocumentReport { chapters: reports, document, workflow: workflow_graph() })
    }
}

fn failed_report(index: u32, reason: String) -> (u32, ChapterReport, Option<String>) {
    (
        index,
        ChapterReport {
            index,
            outcome: ChapterOutcome::Failed(reason),
            rejection_count: 0,
            feedback_rounds: 0,
        },
        None,
    )
}

#[allow(clippy::too_many_arguments)]
async fn run_chapter(
    chapter: Chapter,
    language: Language,
    style: Arc<StyleGuide>,
    graph: Arc<dyn KnowledgeGraph>,
    resolver: Arc<EntityResolver>,
    annotator: Arc<TermAnnotator>,
    extractor: Arc<ChapterExtractor>,
    orchestrator: Arc<Orchestrator>,
) -> (u32, ChapterReport, Option<String>) {
    let index = chapter.index;

    let extraction = match extractor.extract(&chapter.text, &style, language, index).await {
        Ok(extraction) => extraction,
        Err(e) => return failed_report(index, format!("extract: {e}")),
    };

    if let Err(e) = ingest(&extraction, index, &resolver, &graph).await {
        return failed_report(index, format!("ingest: {e}"));
    }

    let annotated = match annotator
        .annotate(AnnotatedText::source(chapter.text.as_str()), index)
        .await
    {
        Ok(annotated) => annotated,
        Err(e) => return failed_report(index, format!("annotate: {e}")),
    };

    let mut state = ChapterState::new(index, chapter.text);
    state.language = Some(language);
    state.style = Some(style);
    state.annotated = Some(annotated.text);

    let state = match orchestrator.run(state).await {
        Ok(state) => state,
        Err(e) => return failed_report(index, e.to_string()),
    };

    let outcome = match &state.status {
        ChapterStatus::Done => ChapterOutcome::Done,
        ChapterStatus::Failed(reason) => ChapterOutcome::Failed(reason.clone()),
        // run() only returns terminal states; anything else is a failure.
        other => ChapterOutcome::Failed(format!("non-terminal status {other:?}")),
    };

    let report = ChapterReport {
        index,
        outcome,
        rejection_count: state.rejection_count,
        feedback_rounds: state.feedback_history.len(),
    };
    (index, report, state.final_text)
}

/// Write one chapter's extraction into the graph: resolve mentions, then
/// insert triplets against the resolved ids. Entities always commit before
/// the triplets that reference them.
async fn ingest(
    extraction: &Extraction,
    chapter: u32,
    resolver: &EntityResolver,
    graph: &Arc<dyn KnowledgeGraph>,
) -> PipelineResult<()> {
    // ALIAS_OF relations are identity structure, not graph facts: they union
    // mention clusters before resolution.
    let alias_links: Vec<(String, String)> = extraction
        .triplets
        .iter()
        .filter(|t| t.predicate == Predicate::AliasOf)
        .map(|t| (t.subject.clone(), t.object.clone()))
        .collect();

    let resolution = resolver
        .resolve_chapter(chapter, &extraction.mentions, &alias_links)
        .await?;

    for triplet in &extraction.triplets {
        if triplet.predicate == Predicate::AliasOf {
            continue;
        }
        let (Some(subject), Some(object)) = (
            resolution.entity_for(&triplet.subject),
            resolution.entity_for(&triplet.object),
        ) else {
            warn!(
                chapter,
                subject = %triplet.subject,
                object = %triplet.object,
                predicate = %triplet.predicate,
                "triplet endpoint did not resolve, skipping"
            );
            continue;
        };
        graph
            .insert_triplet(subject, triplet.predicate, object, chapter, triplet.validity)
            .await?;
    }
    Ok(())
}

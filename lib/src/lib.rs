//! # Chapterloom
//!
//! A chapter-by-chapter literary translation engine. Each chapter moves
//! through staged LLM calls — translate, review, fluency-edit — sequenced by
//! an explicit state machine with a hard bound on review rejections.
//! Cross-chapter consistency comes from a temporal knowledge graph of
//! entities and relations: mentions are resolved against it, locked
//! terminology is annotated into the source before translation, and
//! relations carry validity intervals so later facts supersede earlier ones
//! without erasing them.
//!
//! ## Core Concepts
//!
//! - **Orchestrator**: runs one chapter through the setup/translate/review/
//!   edit state machine, enforcing the rejection ceiling
//! - **Knowledge graph**: entities, aliases, rename events, and temporally
//!   valid triplets behind an async trait
//! - **Resolver**: clusters raw mentions into canonical entities, queuing
//!   ambiguous merges for manual review instead of guessing
//! - **Annotator**: rewrites locked terminology into the text as inline
//!   translation-memory annotations, idempotently
//! - **Pipeline**: ingests an ordered document, overlaps chapter work, and
//!   assembles the final translation plus per-chapter reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use chapterloom::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> chapterloom::error::Result<()> {
//!     let provider = Arc::new(llm::anthropic::AnthropicProvider::from_env()?);
//!     let pipeline = NovelPipeline::new(provider, Arc::new(MemoryGraph::new()));
//!     let report = pipeline
//!         .process_document(vec![Chapter::new(1, "...")])
//!         .await?;
//!     println!("{}", report.document);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod agents;
pub mod annotate;
pub mod error;
pub mod extract;
pub mod graph;
pub mod id;
pub mod language;
pub mod orchestrate;
pub mod pipeline;
pub mod resolve;
pub mod style;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::agents::{FluencyEditor, JuniorEditor, Review, Translator};
    pub use crate::annotate::{AnnotatedText, TermAnnotator};
    pub use crate::error::*;
    pub use crate::extract::{ChapterExtractor, Extraction, RawMention, RawTriplet};
    pub use crate::graph::{
        Alias, AliasStrength, Entity, EntityType, KnowledgeGraph, MemoryGraph, Predicate,
        RenameEvent, TranslationMemoryEntry, Triplet, Validity,
    };
    pub use crate::id::*;
    pub use crate::language::{Language, LanguageDetector, LlmLanguageDetector};
    pub use crate::orchestrate::{ChapterState, ChapterStatus, Orchestrator, Stage};
    pub use crate::pipeline::{Chapter, ChapterOutcome, DocumentReport, NovelPipeline};
    pub use crate::resolve::EntityResolver;
    pub use crate::style::{Genre, StyleArchitect, StyleGuide};
}

//! The translation loop agents.
//!
//! Three pure stage behaviors invoked by the orchestrator: the translator
//! drafts, the junior editor passes verdicts, the fluency editor polishes
//! blind. None of them owns loop control; the orchestrator does.

mod fluency;
mod junior;
pub mod prompts;
mod translator;

pub use fluency::{FluencyEditor, SegmentMap};
pub use junior::{JuniorEditor, Review, APPROVAL_MARKER};
pub use translator::{TranslationJob, Translator};

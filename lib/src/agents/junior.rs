//! The junior editor agent.
//!
//! Produces a verdict and structured feedback. It has no authority over the
//! rejection ceiling; the orchestrator counts rejections.

use super::prompts::build_review_prompt;
use llm::{AgentRole, ChatMessage, LlmProvider, LlmResult};
use std::sync::Arc;
use tracing::debug;

/// Marker the editor emits when the translation passes
pub const APPROVAL_MARKER: &str = "approved response accepted";

/// One review verdict with its feedback text
#[derive(Debug, Clone)]
pub struct Review {
    /// Whether the translation was accepted
    pub approved: bool,
    /// The full feedback text
    pub feedback: String,
}

/// Evaluates candidate translations
pub struct JuniorEditor {
    provider: Arc<dyn LlmProvider>,
}

impl JuniorEditor {
    /// Create a junior editor over the given provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Review a candidate translation against its source
    pub async fn review(&self, source: &str, translation: &str) -> LlmResult<Review> {
        let prompt = build_review_prompt(source, translation, APPROVAL_MARKER);
        let feedback = self
            .provider
            .invoke(&[ChatMessage::user(prompt)], AgentRole::JuniorEditor)
            .await?
            .trim()
            .to_string();

        let approved = feedback.to_lowercase().contains(APPROVAL_MARKER);
        debug!(approved, "junior editor verdict");
        Ok(Review { approved, feedback })
    }
}

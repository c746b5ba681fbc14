//! The translator agent.

use super::prompts::build_translation_prompt;
use crate::language::Language;
use crate::style::StyleGuide;
use llm::{AgentRole, ChatMessage, LlmProvider, LlmResult};
use std::sync::Arc;
use tracing::debug;

/// Everything one translation attempt needs
#[derive(Debug, Clone, Copy)]
pub struct TranslationJob<'a> {
    /// Annotated chapter text
    pub text: &'a str,
    /// Detected source language
    pub language: Language,
    /// The per-document style guide
    pub style: &'a StyleGuide,
    /// The previous attempt, present on re-translation
    pub prior: Option<&'a str>,
    /// The most recent reviewer feedback, present on re-translation
    pub feedback: Option<&'a str>,
}

/// Produces candidate translations
pub struct Translator {
    provider: Arc<dyn LlmProvider>,
}

impl Translator {
    /// Create a translator over the given provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Produce a candidate translation
    pub async fn translate(&self, job: TranslationJob<'_>) -> LlmResult<String> {
        debug!(
            language = %job.language,
            revision = job.feedback.is_some(),
            "requesting translation"
        );
        let prompt =
            build_translation_prompt(job.text, job.language, job.style, job.prior, job.feedback);
        let answer = self
            .provider
            .invoke(&[ChatMessage::user(prompt)], AgentRole::Translator)
            .await?;
        Ok(answer.trim().to_string())
    }
}

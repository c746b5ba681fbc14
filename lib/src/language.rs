//! Source-language detection.
//!
//! Detection is a capability seam: the default implementation asks the
//! provider, but anything implementing [`LanguageDetector`] can be injected,
//! including an offline library or a fixed answer in tests.

use llm::{AgentRole, ChatMessage, LlmError, LlmProvider, LlmResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The closed set of supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Mandarin Chinese
    Chinese,
    /// Japanese
    Japanese,
    /// Korean
    Korean,
    /// English
    English,
    /// French
    French,
    /// German
    German,
    /// Spanish
    Spanish,
    /// Russian
    Russian,
}

impl Language {
    /// Human-readable name, used in prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::English => "English",
            Language::French => "French",
            Language::German => "German",
            Language::Spanish => "Spanish",
            Language::Russian => "Russian",
        }
    }

    /// Every supported language
    pub fn all() -> &'static [Language] {
        &[
            Language::Chinese,
            Language::Japanese,
            Language::Korean,
            Language::English,
            Language::French,
            Language::German,
            Language::Spanish,
            Language::Russian,
        ]
    }

    /// Parse a detector answer, tolerating case and surrounding noise
    pub fn parse_loose(s: &str) -> Option<Self> {
        let trimmed = s.trim().trim_matches(|c: char| !c.is_alphanumeric());
        Language::all()
            .iter()
            .copied()
            .find(|l| l.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability for detecting the language of a text
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Detect the dominant language of `text`
    async fn detect(&self, text: &str) -> LlmResult<Language>;
}

/// Provider-backed detector constrained to the closed language set
pub struct LlmLanguageDetector {
    provider: Arc<dyn LlmProvider>,
}

impl LlmLanguageDetector {
    /// Create a detector over the given provider
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl LanguageDetector for LlmLanguageDetector {
    async fn detect(&self, text: &str) -> LlmResult<Language> {
        let options = Language::all()
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        // A short excerpt is enough to identify a language and keeps the
        // call cheap.
        let excerpt: String = text.chars().take(600).collect();

        let prompt = format!(
            "Identify the language of the text below.\n\
             Answer with exactly one word from this list: {options}.\n\n\
             Text:\n{excerpt}\n\nLanguage:"
        );

        let answer = self
            .provider
            .invoke(&[ChatMessage::user(prompt)], AgentRole::LanguageDetector)
            .await?;

        Language::parse_loose(&answer).ok_or_else(|| {
            LlmError::Parse(format!("detector answered outside the language set: {answer:?}"))
        })
    }
}

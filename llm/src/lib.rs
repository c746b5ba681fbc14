//! # llm
//!
//! An injectable LLM provider capability for staged text-processing
//! pipelines.
//!
//! Every component that needs a completion receives an [`LlmProvider`]
//! explicitly; there is no implicit global client. The crate ships:
//!
//! - [`anthropic::AnthropicProvider`]: a minimal Anthropic messages-API
//!   implementation over reqwest
//! - [`rotate::RotatingProvider`]: bounded retry with credential/endpoint
//!   rotation across a set of inner providers, with a per-call timeout
//! - [`mock::MockProvider`]: a scripted, deterministic provider for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use llm::{AgentRole, LlmProvider};
//! use llm::message::ChatMessage;
//!
//! let provider = llm::anthropic::AnthropicProvider::from_env()?;
//! let text = provider
//!     .invoke(&[ChatMessage::user("Translate: Bonjour")], AgentRole::Translator)
//!     .await?;
//! ```

#![warn(missing_docs)]

pub mod anthropic;
pub mod error;
pub mod message;
pub mod mock;
pub mod rotate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::{LlmError, LlmResult};
pub use message::{ChatMessage, Role};

/// The pipeline role a completion is requested on behalf of.
///
/// Providers may use this to select sampling parameters (a reviewer wants a
/// colder distribution than a translator); it also tags every call for
/// logging and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Detects the source language of a document
    LanguageDetector,
    /// Composes the per-document style guide
    StyleArchitect,
    /// Extracts entity mentions and relation triplets
    Extractor,
    /// Produces candidate translations
    Translator,
    /// Reviews candidate translations
    JuniorEditor,
    /// Performs the final blind fluency pass
    FluencyEditor,
}

impl AgentRole {
    /// Stable string form, used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::LanguageDetector => "language_detector",
            AgentRole::StyleArchitect => "style_architect",
            AgentRole::Extractor => "extractor",
            AgentRole::Translator => "translator",
            AgentRole::JuniorEditor => "junior_editor",
            AgentRole::FluencyEditor => "fluency_editor",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for LLM providers.
///
/// A call either returns the full completion text or an [`LlmError`] that is
/// classified as transient (worth retrying, possibly on another credential)
/// or permanent (escalate to the caller).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a conversation and return the completion text
    async fn invoke(&self, messages: &[ChatMessage], role: AgentRole) -> LlmResult<String>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Check if the provider is configured and ready
    fn is_ready(&self) -> bool {
        true
    }
}

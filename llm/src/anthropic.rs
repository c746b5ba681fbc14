//! Anthropic Claude API provider.
//!
//! A minimal messages-API client. One credential per provider instance;
//! rotation across credentials lives in [`crate::rotate`].

use crate::error::{LlmError, LlmResult};
use crate::message::{ChatMessage, Role};
use crate::{AgentRole, LlmProvider};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anthropic API base URL
const API_BASE: &str = "https://api.anthropic.com/v1";

/// API version header value
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl AnthropicProvider {
    /// Create a new provider with one API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> LlmResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::Configuration("ANTHROPIC_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the completion token ceiling
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Sampling temperature per pipeline role. Review and extraction want a
    /// cold distribution; translation and fluency editing want some width.
    fn temperature_for(role: AgentRole) -> f32 {
        match role {
            AgentRole::LanguageDetector | AgentRole::Extractor => 0.0,
            AgentRole::JuniorEditor | AgentRole::StyleArchitect => 0.2,
            AgentRole::Translator => 0.7,
            AgentRole::FluencyEditor => 0.8,
        }
    }

    fn build_headers(&self) -> LlmResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LlmError::Configuration(format!("Invalid API key: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    /// Fold system messages into the system field; everything else becomes
    /// an API message.
    fn to_api_request(&self, messages: &[ChatMessage], role: AgentRole) -> ApiRequest {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let api_messages: Vec<ApiMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: if system.is_empty() { None } else { Some(system.join("\n\n")) },
            messages: api_messages,
            temperature: Some(Self::temperature_for(role)),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn invoke(&self, messages: &[ChatMessage], role: AgentRole) -> LlmResult<String> {
        let headers = self.build_headers()?;
        let api_request = self.to_api_request(messages, role);

        let response = self
            .client
            .post(format!("{}/messages", API_BASE))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_body = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LlmError::Authentication { reason: error_body },
                429 => LlmError::RateLimited { retry_after },
                code => LlmError::Api { status: code, message: error_body },
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text: String = api_response
            .content
            .into_iter()
            .map(|c| match c {
                ApiContent::Text { text } => text,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::Parse("response contained no text content".to_string()));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// API request/response types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key");
        assert_eq!(provider.name(), "anthropic");
        assert!(provider.is_ready());
    }

    #[test]
    fn test_system_messages_folded() {
        let provider = AnthropicProvider::new("test-key");
        let messages = vec![
            ChatMessage::system("You translate fiction."),
            ChatMessage::user("Translate this."),
        ];
        let request = provider.to_api_request(&messages, AgentRole::Translator);
        assert_eq!(request.system.as_deref(), Some("You translate fiction."));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[test]
    fn test_role_temperatures() {
        assert_eq!(AnthropicProvider::temperature_for(AgentRole::Extractor), 0.0);
        assert!(
            AnthropicProvider::temperature_for(AgentRole::Translator)
                > AnthropicProvider::temperature_for(AgentRole::JuniorEditor)
        );
    }
}

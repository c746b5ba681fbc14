//! Error types for LLM provider calls.
//!
//! The taxonomy matters more than the variants: [`LlmError::is_transient`]
//! decides whether the rotating wrapper retries on another credential or
//! escalates immediately.

use std::time::Duration;

/// Errors returned by LLM providers
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// API error from the provider
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or error description
        message: String,
    },

    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its deadline
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// How long the request was allowed to run
        duration: Duration,
    },

    /// Provider rejected the request due to rate limiting
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Provider-suggested wait, if any
        retry_after: Option<Duration>,
    },

    /// Response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider is misconfigured (missing key, bad model name, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credential was rejected
    #[error("Authentication failed: {reason}")]
    Authentication {
        /// Why the credential was rejected
        reason: String,
    },

    /// Every credential/endpoint was tried and failed
    #[error("All {attempts} provider attempts failed, last error: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: usize,
        /// Display form of the final error
        last: String,
    },
}

impl LlmError {
    /// Whether a retry (possibly on a different credential) could succeed.
    ///
    /// Rate limits, timeouts, network failures, and 5xx responses are
    /// transient. Parse failures, authentication failures, and 4xx responses
    /// other than 408/429 are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout { .. } | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            LlmError::Parse(_)
            | LlmError::Configuration(_)
            | LlmError::Authentication { .. }
            | LlmError::Exhausted { .. } => false,
        }
    }
}

/// Result type for LLM operations
pub type LlmResult<T> = std::result::Result<T, LlmError>;

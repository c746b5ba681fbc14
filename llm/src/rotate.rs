//! Bounded retry with credential/endpoint rotation.
//!
//! [`RotatingProvider`] wraps an ordered set of inner providers, each holding
//! one credential or endpoint. A transient failure advances to the next
//! provider; a permanent failure escalates immediately. Every attempt runs
//! under its own deadline so no caller blocks indefinitely.

use crate::error::{LlmError, LlmResult};
use crate::message::ChatMessage;
use crate::{AgentRole, LlmProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Default per-attempt deadline
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A provider that retries transient failures across a pool of credentials
pub struct RotatingProvider {
    providers: Vec<Arc<dyn LlmProvider>>,
    max_attempts: usize,
    timeout: Duration,
    cursor: AtomicUsize,
}

impl RotatingProvider {
    /// Create a rotating provider over a non-empty pool.
    ///
    /// `max_attempts` defaults to one pass over the pool.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> LlmResult<Self> {
        if providers.is_empty() {
            return Err(LlmError::Configuration(
                "rotating provider needs at least one credential".to_string(),
            ));
        }
        let max_attempts = providers.len();
        Ok(Self {
            providers,
            max_attempts,
            timeout: DEFAULT_TIMEOUT,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Set the total attempt bound
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the per-attempt deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of credentials in the pool
    pub fn available(&self) -> usize {
        self.providers.len()
    }
}

#[async_trait]
impl LlmProvider for RotatingProvider {
    async fn invoke(&self, messages: &[ChatMessage], role: AgentRole) -> LlmResult<String> {
        let start = self.cursor.load(Ordering::Relaxed);
        let mut last = String::new();

        for attempt in 0..self.max_attempts {
            let index = (start + attempt) % self.providers.len();
            let provider = &self.providers[index];

            let outcome = tokio::time::timeout(self.timeout, provider.invoke(messages, role)).await;

            match outcome {
                Ok(Ok(text)) => {
                    self.cursor.store(index, Ordering::Relaxed);
                    return Ok(text);
                }
                Ok(Err(err)) if err.is_transient() => {
                    warn!(
                        provider = provider.name(),
                        role = %role,
                        attempt,
                        error = %err,
                        "transient provider failure, rotating credential"
                    );
                    last = err.to_string();
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        role = %role,
                        attempt,
                        "provider call exceeded deadline, rotating credential"
                    );
                    last = LlmError::Timeout { duration: self.timeout }.to_string();
                }
            }
        }

        Err(LlmError::Exhausted { attempts: self.max_attempts, last })
    }

    fn name(&self) -> &str {
        "rotating"
    }

    fn is_ready(&self) -> bool {
        self.providers.iter().any(|p| p.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn pool(providers: Vec<MockProvider>) -> RotatingProvider {
        RotatingProvider::new(
            providers
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rotates_past_transient_failure() {
        let failing = MockProvider::new();
        failing.enqueue_err(AgentRole::Translator, LlmError::RateLimited { retry_after: None });
        let healthy = MockProvider::new();
        healthy.enqueue(AgentRole::Translator, "second key wins");

        let rotating = pool(vec![failing, healthy]);
        let text = rotating
            .invoke(&[ChatMessage::user("hi")], AgentRole::Translator)
            .await
            .unwrap();
        assert_eq!(text, "second key wins");
    }

    #[tokio::test]
    async fn test_permanent_failure_escalates() {
        let failing = MockProvider::new();
        failing.enqueue_err(AgentRole::Translator, LlmError::Parse("garbage".into()));
        let healthy = MockProvider::new();
        healthy.enqueue(AgentRole::Translator, "never reached");

        let rotating = pool(vec![failing, healthy]);
        let err = rotating
            .invoke(&[ChatMessage::user("hi")], AgentRole::Translator)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn test_exhaustion_after_bounded_attempts() {
        let a = MockProvider::new();
        let b = MockProvider::new();
        for provider in [&a, &b] {
            provider.enqueue_err(AgentRole::Translator, LlmError::Network("reset".into()));
        }

        let rotating = pool(vec![a, b]);
        let err = rotating
            .invoke(&[ChatMessage::user("hi")], AgentRole::Translator)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Exhausted { attempts: 2, .. }));
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(RotatingProvider::new(Vec::new()).is_err());
    }
}

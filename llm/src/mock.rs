//! Scripted provider for deterministic tests.
//!
//! Responses are queued per role; every invocation is recorded so tests can
//! assert ordering properties (for instance that no translation call happens
//! before both setup calls have completed).

use crate::error::{LlmError, LlmResult};
use crate::message::ChatMessage;
use crate::{AgentRole, LlmProvider};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Role the call was made under
    pub role: AgentRole,
    /// Concatenated message contents, for prompt assertions
    pub prompt: String,
}

#[derive(Default)]
struct MockInner {
    queues: HashMap<AgentRole, VecDeque<LlmResult<String>>>,
    defaults: HashMap<AgentRole, String>,
    calls: Vec<RecordedCall>,
}

/// A deterministic, scripted LLM provider
#[derive(Default)]
pub struct MockProvider {
    inner: Mutex<MockInner>,
}

impl MockProvider {
    /// Create an empty mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for a role
    pub fn enqueue(&self, role: AgentRole, response: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.queues.entry(role).or_default().push_back(Ok(response.into()));
    }

    /// Queue a failure for a role
    pub fn enqueue_err(&self, role: AgentRole, error: LlmError) {
        let mut inner = self.inner.lock().unwrap();
        inner.queues.entry(role).or_default().push_back(Err(error));
    }

    /// Set a fallback response returned when a role's queue is empty
    pub fn set_default(&self, role: AgentRole, response: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.defaults.insert(role, response.into());
    }

    /// All invocations so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Index of the first call made under `role`, if any
    pub fn first_call_index(&self, role: AgentRole) -> Option<usize> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .position(|c| c.role == role)
    }

    /// Number of calls made under `role`
    pub fn call_count(&self, role: AgentRole) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.role == role)
            .count()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn invoke(&self, messages: &[ChatMessage], role: AgentRole) -> LlmResult<String> {
        let mut inner = self.inner.lock().unwrap();

        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        inner.calls.push(RecordedCall { role, prompt });

        if let Some(queued) = inner.queues.get_mut(&role).and_then(|q| q.pop_front()) {
            return queued;
        }
        if let Some(default) = inner.defaults.get(&role) {
            return Ok(default.clone());
        }
        Err(LlmError::Configuration(format!(
            "no scripted response for role {}",
            role
        )))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_cycle_in_order() {
        let mock = MockProvider::new();
        mock.enqueue(AgentRole::Translator, "first");
        mock.enqueue(AgentRole::Translator, "second");

        let msg = [ChatMessage::user("go")];
        assert_eq!(mock.invoke(&msg, AgentRole::Translator).await.unwrap(), "first");
        assert_eq!(mock.invoke(&msg, AgentRole::Translator).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_default_when_queue_empty() {
        let mock = MockProvider::new();
        mock.set_default(AgentRole::JuniorEditor, "looks fine");

        let msg = [ChatMessage::user("review")];
        assert_eq!(
            mock.invoke(&msg, AgentRole::JuniorEditor).await.unwrap(),
            "looks fine"
        );
        assert_eq!(mock.call_count(AgentRole::JuniorEditor), 1);
    }

    #[tokio::test]
    async fn test_unscripted_role_errors() {
        let mock = MockProvider::new();
        let err = mock
            .invoke(&[ChatMessage::user("x")], AgentRole::Extractor)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));
    }
}

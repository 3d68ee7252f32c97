//! A scriptable `AnalysisBackend` test double (§10.4), following the
//! teacher's `MockAI`: a FIFO queue of canned responses (or a scripted
//! failure), with every call's messages recorded for assertions.

use std::sync::Mutex;

use async_trait::async_trait;

use super::analysis_backend::{AnalysisBackend, AnalysisBackendError, Message};

#[derive(Default)]
pub struct ScriptedAnalysisBackend {
    responses: Mutex<Vec<String>>,
    failures: Mutex<Vec<AnalysisBackendError>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedAnalysisBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful completion (builder-style, FIFO order).
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(response.into());
        self
    }

    /// Queues a failure ahead of any already-queued successes (builder-style, FIFO order).
    pub fn with_failure(self, error: AnalysisBackendError) -> Self {
        self.failures.lock().unwrap().push(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<Vec<Message>> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn was_called_with(&self, text: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|messages| messages.iter().any(|m| m.content.contains(text)))
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedAnalysisBackend {
    async fn generate_completion(&self, messages: &[Message]) -> Result<String, AnalysisBackendError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        if !self.failures.lock().unwrap().is_empty() {
            return Err(self.failures.lock().unwrap().remove(0));
        }

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            Ok(responses.remove(0))
        } else {
            Ok("scripted analysis response".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_queued_responses_in_order() {
        let backend = ScriptedAnalysisBackend::new().with_response("first").with_response("second");

        let first = backend.generate_completion(&[Message::user("go")]).await.unwrap();
        let second = backend.generate_completion(&[Message::user("go again")]).await.unwrap();

        assert_eq!(first, "first");
        assert_eq!(second, "second");
        assert_eq!(backend.call_count(), 2);
        assert!(backend.was_called_with("go again"));
    }

    #[tokio::test]
    async fn queued_failure_is_returned_before_success() {
        let backend = ScriptedAnalysisBackend::new()
            .with_failure(AnalysisBackendError::RateLimited)
            .with_response("never reached first");

        let result = backend.generate_completion(&[Message::user("go")]).await;
        assert!(matches!(result, Err(AnalysisBackendError::RateLimited)));
    }
}

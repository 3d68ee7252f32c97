use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::anthropic;

use super::analysis_backend::{AnalysisBackend, AnalysisBackendError, Message, Role};

/// Wraps `rig`'s Anthropic client the way the teacher wrapped it for its own
/// `BaseAI` implementation, minus the JSON-mode helpers this backend doesn't need.
pub struct ClaudeAnalysisBackend {
    client: anthropic::Client,
    model: String,
}

impl ClaudeAnalysisBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: anthropic::Client::new(&api_key.into()),
            model: anthropic::CLAUDE_3_5_SONNET.to_string(),
        }
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: anthropic::Client::new(&api_key.into()),
            model: model.into(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for ClaudeAnalysisBackend {
    async fn generate_completion(
        &self,
        messages: &[Message],
    ) -> Result<String, AnalysisBackendError> {
        let preamble = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&preamble)
            .max_tokens(4096)
            .build();

        agent.prompt(prompt.as_str()).await.map_err(|err| {
            let msg = err.to_string();
            if msg.contains("401") || msg.contains("unauthorized") {
                AnalysisBackendError::Unauthorized
            } else if msg.contains("429") {
                AnalysisBackendError::RateLimited
            } else if msg.contains("timed out") || msg.contains("timeout") {
                AnalysisBackendError::Timeout
            } else {
                AnalysisBackendError::BackendUnavailable(msg)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_system_and_user_messages() {
        let messages = vec![Message::system("be terse"), Message::user("hello")];
        let system: Vec<_> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .collect();
        assert_eq!(system.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires ANTHROPIC_API_KEY"]
    async fn live_completion() {
        let backend = ClaudeAnalysisBackend::new(
            std::env::var("ANTHROPIC_API_KEY").expect("ANTHROPIC_API_KEY"),
        );
        let result = backend
            .generate_completion(&[Message::user("Say hello in one word.")])
            .await
            .unwrap();
        assert!(!result.is_empty());
    }
}

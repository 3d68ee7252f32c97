use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum AnalysisBackendError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("timeout")]
    Timeout,
}

/// The analysis collaborator (§6.3). The prompt format is the orchestrator's
/// concern; this trait only moves role-tagged messages to opaque text.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn generate_completion(
        &self,
        messages: &[Message],
    ) -> Result<String, AnalysisBackendError>;
}

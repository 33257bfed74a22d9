//! Answer agent trait and common types.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use warden_core::Answer;

use crate::providers::ProviderError;

/// Errors from answer agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Agent reached no answer")]
    NoAnswer,

    #[error("Operation not supported by this agent")]
    Unsupported,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Async question answerer.
///
/// The runner treats any error as a failed answer and falls back to the
/// evidence scorer, so agents report failure rather than guessing.
#[async_trait]
pub trait AnswerAgent: Send + Sync {
    /// Name used for logs and circuit breaker state.
    fn name(&self) -> &str;

    /// Answer a yes/no question from the document text.
    async fn answer(&self, question: &str, document: &str) -> Result<Answer, AgentError>;

    /// Free-text reply to a classification prompt.
    ///
    /// Agents without a model cannot classify.
    async fn classify(&self, _prompt: &str) -> Result<String, AgentError> {
        Err(AgentError::Unsupported)
    }
}

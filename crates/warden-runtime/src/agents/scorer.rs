//! Offline agent backed by the evidence scorer.

use async_trait::async_trait;
use warden_core::{Answer, EvidenceScorer};

use super::traits::{AgentError, AnswerAgent};

/// Answers questions by keyword coverage. Never fails and never classifies.
#[derive(Debug, Clone, Default)]
pub struct ScorerAgent {
    scorer: EvidenceScorer,
}

impl ScorerAgent {
    pub fn new(scorer: EvidenceScorer) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl AnswerAgent for ScorerAgent {
    fn name(&self) -> &str {
        "scorer"
    }

    async fn answer(&self, question: &str, document: &str) -> Result<Answer, AgentError> {
        Ok(self.scorer.fallback_answer(question, document))
    }
}

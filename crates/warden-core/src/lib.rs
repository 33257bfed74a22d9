//! # warden-core
//!
//! Deterministic compliance verdict engine.
//!
//! A document is classified into a compliance scenario, then interrogated
//! against that scenario's yes/no decision tree one question at a time. Every
//! answer is routed by confidence: HIGH answers continue, MEDIUM answers
//! continue but are flagged for review, LOW answers stop the case as
//! MISSING_INFO. The collected answers are finally scored into a verdict.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the same answers for the same tree give the same path and verdict
//! 2. **No LLM calls**: answering questions is delegated to a [`QuestionAnswerer`]
//! 3. **Never silent on low confidence**: a LOW answer is never treated as YES or NO
//! 4. **Failure-contained**: `evaluate` returns a PENDING case instead of an error
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_core::{DecisionTreeEngine, Document, ScenarioRegistry};
//!
//! let registry = Arc::new(ScenarioRegistry::load_dir("scenarios")?);
//! let engine = DecisionTreeEngine::new(registry);
//! let offline = |q: &str, doc: &str| Ok(engine.fallback_answer(q, doc));
//!
//! let case = engine.evaluate(&Document::new("a-1", text), &offline);
//! println!("{}: {}", case.verdict, case.verdict_reason);
//! ```

pub mod aggregator;
pub mod classifier;
pub mod engine;
pub mod evidence;
pub mod router;
pub mod scenario;
pub mod threshold;
pub mod types;

// Re-export main types at crate root
pub use aggregator::{VerdictAggregator, VerdictSummary};
pub use classifier::{Classification, ScenarioClassifier};
pub use engine::{DecisionTreeEngine, QuestionAnswerer, Step};
pub use evidence::{EvidenceReport, EvidenceScorer};
pub use router::{ConfidenceRouter, LowConfidencePolicy, RouteAction, RouterConfig};
pub use scenario::{DecisionTree, QuestionNode, Scenario, ScenarioError, ScenarioRegistry};
pub use threshold::{Comparator, ThresholdCheck};
pub use types::{
    Answer, AnswerRecord, AnswerSource, Case, CasePhase, ConfidenceTier, Document,
    MissingFieldRecord, NodeId, Verdict,
};

use thiserror::Error;

/// Errors that can occur while driving a case
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Node {node_id} not found in scenario {scenario_id}")]
    TreeNodeNotFound { scenario_id: String, node_id: String },

    #[error("Cycle detected: node {node_id} was already answered")]
    CycleDetected { node_id: String },

    #[error("Invalid comparator: {0}")]
    InvalidComparator(String),

    #[error("Case {0} is already closed")]
    CaseClosed(String),

    #[error("Case is in phase {actual:?}, expected {expected:?}")]
    UnexpectedPhase { expected: CasePhase, actual: CasePhase },

    #[error("Invalid router configuration: {0}")]
    InvalidRouterConfig(String),
}

/// A question answerer could not produce an answer.
///
/// Recovered by the engine through the evidence scorer; never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Question answerer failed: {message}")]
pub struct AnswererFailure {
    pub message: String,
}

impl AnswererFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    fn sample_registry() -> ScenarioRegistry {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
        ScenarioRegistry::load_dir(dir).unwrap()
    }

    #[test]
    fn test_sample_scenarios_load() {
        let registry = sample_registry();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["art_dealing", "cannabis_business", "commodity_trading"]);
        for scenario in registry.iter() {
            assert!(!scenario.keywords.is_empty());
            assert!(scenario.question(&scenario.start).is_some());
        }
    }

    #[test]
    fn test_offline_evaluation_of_sample_document() {
        let engine = DecisionTreeEngine::new(Arc::new(sample_registry()));
        let offline = |q: &str, doc: &str| -> Result<Answer, AnswererFailure> {
            Ok(engine.fallback_answer(q, doc))
        };

        let text = "Greenleaf Ltd operates licensed marijuana dispensaries. Cannabis \
                    revenue is more than 10% of total income from cannabis activities.";
        let case = engine.evaluate(&Document::new("greenleaf", text), &offline);

        assert_eq!(case.scenario_id.as_deref(), Some("cannabis_business"));
        assert!(case.is_closed());
        assert!(case.error.is_none());
        assert!(case.risk_score >= 0.0 && case.risk_score <= 1.0);
    }

    #[test]
    fn test_answerer_failure_display() {
        let failure = AnswererFailure::new("timeout");
        assert_eq!(failure.to_string(), "Question answerer failed: timeout");
    }
}

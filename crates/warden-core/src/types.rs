//! Core types for Warden compliance cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a question node inside a decision tree (e.g. "Q1").
pub type NodeId = String;

/// Final disposition of a case.
///
/// `Pending` is the only non-terminal value. Any other verdict closes the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Unresolved, or the case failed before a verdict could be written
    #[default]
    Pending,

    /// Compliance risk found - escalate
    Hit,

    /// No risk found - approve
    NoHit,

    /// Evidence was insufficient to answer a question - request documents
    MissingInfo,
}

impl Verdict {
    /// Whether this verdict closes the case.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::Pending)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pending => "PENDING",
            Verdict::Hit => "HIT",
            Verdict::NoHit => "NO_HIT",
            Verdict::MissingInfo => "MISSING_INFO",
        };
        f.write_str(label)
    }
}

/// Confidence bucket derived from a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    /// Trusted; traversal continues normally
    High,

    /// Accepted but flagged for human review
    Medium,

    /// Rejected; interrogation stops with MISSING_INFO
    Low,
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerSource {
    /// The external question answerer
    #[default]
    Answerer,

    /// The heuristic evidence scorer, after the answerer failed
    Fallback,

    /// A previously cached answerer result
    Cache,
}

/// An answer to one yes/no question, as produced by a question answerer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// YES (true) or NO (false)
    pub answer: bool,

    /// Confidence in the answer (0.0 - 1.0)
    pub confidence: f64,

    /// Supporting quote or reasoning
    #[serde(default)]
    pub evidence: String,
}

impl Answer {
    pub fn new(answer: bool, confidence: f64, evidence: impl Into<String>) -> Self {
        Self {
            answer,
            confidence,
            evidence: evidence.into(),
        }
    }

    pub fn yes(confidence: f64, evidence: impl Into<String>) -> Self {
        Self::new(true, confidence, evidence)
    }

    pub fn no(confidence: f64, evidence: impl Into<String>) -> Self {
        Self::new(false, confidence, evidence)
    }
}

/// Record of one visited node. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: NodeId,
    pub question_text: String,
    pub answer: bool,
    pub evidence: String,
    pub confidence: f64,
    pub confidence_tier: ConfidenceTier,
    #[serde(default)]
    pub source: AnswerSource,
}

/// A question that could not be answered with enough confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingFieldRecord {
    pub question_id: NodeId,
    pub question_text: String,
    pub confidence: f64,

    /// Documents that would let the question be answered
    pub suggested_documents: String,
}

/// Where a case currently sits in the decision state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CasePhase {
    #[default]
    Classifying,
    Interrogating,
    Verdicting,

    /// No scenario matched; closed as NO_HIT without interrogation
    Aborted,

    /// Verdict written
    Closed,

    /// Evaluation failed; verdict stays PENDING and `error` is set
    Failed,
}

/// A document submitted for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Mutable state threaded through one traversal.
///
/// A case is owned by exactly one evaluation; it is never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub article_id: String,

    /// Document under evaluation (not serialized with the result)
    #[serde(skip)]
    pub document_text: String,

    pub scenario_id: Option<String>,
    pub scenario_name: Option<String>,

    /// Keyword classification confidence (0.0 when classified by reply or not at all)
    #[serde(default)]
    pub classification_confidence: f64,

    #[serde(default)]
    pub matched_keywords: Vec<String>,

    pub phase: CasePhase,

    /// Node awaiting an answer; empty once interrogation has ended
    pub current_node: NodeId,

    /// Visited node ids in visit order
    #[serde(default)]
    pub path: Vec<NodeId>,

    #[serde(default)]
    pub answers: BTreeMap<NodeId, AnswerRecord>,

    #[serde(default)]
    pub missing_fields: Vec<MissingFieldRecord>,

    #[serde(default)]
    pub uncertain_node_ids: Vec<NodeId>,

    #[serde(default)]
    pub early_terminated: bool,

    pub verdict: Verdict,

    #[serde(default)]
    pub verdict_reason: String,

    #[serde(default)]
    pub risk_score: f64,

    #[serde(default)]
    pub recommended_action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl Case {
    /// Open a new case in the `Classifying` phase.
    pub fn new(article_id: impl Into<String>, document_text: impl Into<String>) -> Self {
        Self {
            article_id: article_id.into(),
            document_text: document_text.into(),
            scenario_id: None,
            scenario_name: None,
            classification_confidence: 0.0,
            matched_keywords: Vec::new(),
            phase: CasePhase::Classifying,
            current_node: String::new(),
            path: Vec::new(),
            answers: BTreeMap::new(),
            missing_fields: Vec::new(),
            uncertain_node_ids: Vec::new(),
            early_terminated: false,
            verdict: Verdict::Pending,
            verdict_reason: String::new(),
            risk_score: 0.0,
            recommended_action: String::new(),
            error: None,
            evaluated_at: None,
        }
    }

    /// A case that failed before it could be evaluated at all.
    pub fn failed(article_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut case = Self::new(article_id, String::new());
        case.fail(error);
        case
    }

    /// Whether the case has a terminal verdict.
    pub fn is_closed(&self) -> bool {
        self.verdict.is_terminal()
    }

    /// Whether the case can still accept transitions.
    pub fn is_open(&self) -> bool {
        !self.is_closed()
            && !matches!(
                self.phase,
                CasePhase::Aborted | CasePhase::Closed | CasePhase::Failed
            )
    }

    /// Mark the case failed. The verdict stays PENDING.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.verdict = Verdict::Pending;
        self.phase = CasePhase::Failed;
        self.current_node.clear();
        self.error = Some(error.into());
    }
}

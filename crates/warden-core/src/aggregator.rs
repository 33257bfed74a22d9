//! Verdict aggregation: turns a finished case into a verdict and rationale.
//!
//! Rules, first match wins:
//! 1. Early termination or missing fields → MISSING_INFO, risk 0
//! 2. Red-flag YES answers → HIT
//! 3. Otherwise → NO_HIT
//!
//! Medium-confidence answers never change the verdict; they add a review note.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::evidence::truncate_chars;
use crate::types::{AnswerRecord, Case, Verdict};

lazy_static! {
    /// Question phrases that make a YES answer a compliance hit.
    static ref RED_FLAGS: Vec<&'static str> = vec![
        "illegal",
        "more than 10%",
        "more than 25%",
        "executive",
        "board of directors",
        "direct",
    ];
}

const RED_FLAG_WEIGHT: f64 = 0.3;
const YES_WEIGHT: f64 = 0.1;
const REASON_TEXT_CHARS: usize = 60;

pub const ESCALATE_ACTION: &str = "Escalate to compliance team for manual review";
pub const APPROVE_ACTION: &str = "Approve - proceed with onboarding";
pub const NO_RISK_REASON: &str = "No compliance risks identified";
pub const UNCLASSIFIED_REASON: &str = "No matching compliance scenario identified";

/// The outcome written back onto a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub verdict: Verdict,
    pub reason: String,
    pub risk_score: f64,
    pub recommended_action: String,
}

/// Scores collected answers into a final verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictAggregator;

impl VerdictAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Summary for a case that never matched a scenario.
    pub fn unclassified(&self) -> VerdictSummary {
        VerdictSummary {
            verdict: Verdict::NoHit,
            reason: UNCLASSIFIED_REASON.to_string(),
            risk_score: 0.0,
            recommended_action: APPROVE_ACTION.to_string(),
        }
    }

    pub fn aggregate(&self, case: &Case) -> VerdictSummary {
        let mut summary = if case.early_terminated || !case.missing_fields.is_empty() {
            self.missing_info(case)
        } else {
            self.score_answers(case)
        };

        if !case.uncertain_node_ids.is_empty() {
            let ids = case.uncertain_node_ids.join(", ");
            summary.reason.push_str(&format!(
                " [Flagged for review: {} answered with medium confidence]",
                ids
            ));
            summary
                .recommended_action
                .push_str(&format!("; verify medium-confidence answers for {}", ids));
        }

        summary
    }

    fn missing_info(&self, case: &Case) -> VerdictSummary {
        let questions: Vec<String> = case
            .missing_fields
            .iter()
            .map(|field| {
                format!(
                    "{}: {}...",
                    field.question_id,
                    truncate_chars(&field.question_text, REASON_TEXT_CHARS)
                )
            })
            .collect();

        let mut documents: Vec<&str> = Vec::new();
        for field in &case.missing_fields {
            let doc = field.suggested_documents.as_str();
            if !doc.is_empty() && !documents.contains(&doc) {
                documents.push(doc);
            }
        }

        let reason = if questions.is_empty() {
            "Insufficient information to answer the decision tree".to_string()
        } else {
            format!("Insufficient information to answer: {}", questions.join("; "))
        };

        let recommended_action = if documents.is_empty() {
            "Request additional documents".to_string()
        } else {
            format!("Request additional documents: {}", documents.join(", "))
        };

        VerdictSummary {
            verdict: Verdict::MissingInfo,
            reason,
            risk_score: 0.0,
            recommended_action,
        }
    }

    fn score_answers(&self, case: &Case) -> VerdictSummary {
        let mut risk_score = 0.0;
        let mut hit_reasons = Vec::new();

        for record in visit_order(case) {
            if !record.answer {
                continue;
            }

            let question = record.question_text.to_lowercase();
            if RED_FLAGS.iter().any(|flag| question.contains(flag)) {
                risk_score += RED_FLAG_WEIGHT;
                hit_reasons.push(format!(
                    "{}: {}...",
                    record.question_id,
                    truncate_chars(&record.question_text, REASON_TEXT_CHARS)
                ));
            } else {
                risk_score += YES_WEIGHT;
            }
        }

        let risk_score = f64::min(risk_score, 1.0);

        if hit_reasons.is_empty() {
            VerdictSummary {
                verdict: Verdict::NoHit,
                reason: NO_RISK_REASON.to_string(),
                risk_score,
                recommended_action: APPROVE_ACTION.to_string(),
            }
        } else {
            VerdictSummary {
                verdict: Verdict::Hit,
                reason: hit_reasons.join("; "),
                risk_score,
                recommended_action: ESCALATE_ACTION.to_string(),
            }
        }
    }
}

/// Answer records in visit order, then any not on the path.
fn visit_order(case: &Case) -> impl Iterator<Item = &AnswerRecord> {
    let on_path = case.path.iter().filter_map(move |id| case.answers.get(id));
    let off_path = case
        .answers
        .iter()
        .filter(move |(id, _)| !case.path.contains(id))
        .map(|(_, record)| record);
    on_path.chain(off_path)
}

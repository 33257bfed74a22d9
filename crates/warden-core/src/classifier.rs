//! Scenario classification by keyword matching.
//!
//! Each scenario scores one point per keyword found in the document
//! (case-insensitive substring). The strictly highest score wins; on a tie the
//! first scenario in registry order keeps priority, so the lexicographically
//! smallest id wins.

use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioRegistry;

/// Number of keyword matches that yields full classification confidence.
const FULL_CONFIDENCE_MATCHES: f64 = 3.0;

/// Result of classifying a document into a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub scenario_id: String,
    pub scenario_name: String,

    /// `min(matches / 3, 1.0)`; 0.0 when classified from an answerer reply
    pub confidence: f64,

    /// Matched keywords in sorted order
    pub matched_keywords: Vec<String>,
}

/// Keyword-based scenario classifier. Pure over the text and registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioClassifier;

impl ScenarioClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a document. Returns `None` when no scenario has a single match.
    pub fn classify(&self, text: &str, registry: &ScenarioRegistry) -> Option<Classification> {
        let text = text.to_lowercase();
        let mut best: Option<(usize, Classification)> = None;

        for scenario in registry.iter() {
            // keywords is a BTreeSet, so matches come out sorted
            let matched: Vec<String> = scenario
                .keywords
                .iter()
                .filter(|keyword| !keyword.is_empty() && text.contains(keyword.as_str()))
                .cloned()
                .collect();

            let count = matched.len();
            if count == 0 {
                continue;
            }

            let beats_best = best.as_ref().map_or(true, |(top, _)| count > *top);
            if beats_best {
                best = Some((
                    count,
                    Classification {
                        scenario_id: scenario.id.clone(),
                        scenario_name: scenario.name.clone(),
                        confidence: (count as f64 / FULL_CONFIDENCE_MATCHES).min(1.0),
                        matched_keywords: matched,
                    },
                ));
            }
        }

        match best {
            Some((count, classification)) => {
                tracing::debug!(
                    scenario = %classification.scenario_id,
                    matches = count,
                    confidence = classification.confidence,
                    "Document classified by keywords"
                );
                Some(classification)
            }
            None => {
                tracing::debug!("No scenario keyword matched");
                None
            }
        }
    }

    /// Extract a scenario from a free-text classification reply.
    ///
    /// The first registry id occurring in the lower-cased reply wins. A reply
    /// of `none` or one naming no known id yields `None`.
    pub fn match_reply(&self, reply: &str, registry: &ScenarioRegistry) -> Option<Classification> {
        let reply = reply.trim().to_lowercase();
        if reply.is_empty() || reply == "none" {
            return None;
        }

        registry
            .iter()
            .find(|scenario| reply.contains(&scenario.id.to_lowercase()))
            .map(|scenario| Classification {
                scenario_id: scenario.id.clone(),
                scenario_name: scenario.name.clone(),
                confidence: 0.0,
                matched_keywords: Vec::new(),
            })
    }
}

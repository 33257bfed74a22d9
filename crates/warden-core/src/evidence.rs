//! Heuristic evidence scoring over raw document text.
//!
//! The scorer extracts the significant terms of a question, looks for each in
//! the document and quotes the surrounding context. Its term coverage is the
//! confidence. It doubles as the fallback answer source when a question
//! answerer is unavailable.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::types::Answer;

lazy_static! {
    static ref WORD_PATTERN: Regex = Regex::new(r"\w+").unwrap();

    static ref STOP_WORDS: HashSet<&'static str> = [
        "is", "the", "a", "an", "does", "are", "there", "any", "have", "has", "been", "to",
        "of", "in", "for", "with", "this", "that", "client", "involved", "activity", "business",
    ]
    .into_iter()
    .collect();
}

/// Characters of context quoted on each side of a match.
pub const DEFAULT_CONTEXT_CHARS: usize = 300;

/// Maximum snippets kept per report.
pub const MAX_SNIPPETS: usize = 5;

/// Snippets included in a tool observation.
const OBSERVATION_SNIPPETS: usize = 3;

/// Maximum length of quoted evidence in answers and observations.
const EVIDENCE_CHARS: usize = 300;

/// Confidence above which a fallback answer is YES.
const FALLBACK_YES_THRESHOLD: f64 = 0.75;

/// What the scorer found for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceReport {
    pub query: String,
    pub found: bool,

    /// Up to five deduplicated context snippets
    pub evidence: Vec<String>,

    /// Query terms that occur in the text, sorted
    pub matched_terms: Vec<String>,

    /// Matched terms over query terms (0.0 if the query has no terms)
    pub confidence: f64,
}

/// Keyword-coverage evidence scorer.
#[derive(Debug, Clone)]
pub struct EvidenceScorer {
    context_chars: usize,
}

impl Default for EvidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceScorer {
    pub fn new() -> Self {
        Self {
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }

    /// Use a different context window size.
    pub fn with_context_chars(mut self, context_chars: usize) -> Self {
        self.context_chars = context_chars;
        self
    }

    /// Significant terms of a query: lower-cased `\w+` runs, minus stop words
    /// and tokens of two characters or fewer. Order of first appearance.
    pub fn query_terms(query: &str) -> Vec<String> {
        let lowered = query.to_lowercase();
        let mut seen = HashSet::new();

        WORD_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
            .filter(|w| seen.insert(w.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Score how well `text` supports `query`.
    pub fn score(&self, query: &str, text: &str) -> EvidenceReport {
        let terms = Self::query_terms(query);
        let mut snippets: Vec<String> = Vec::new();
        let mut matched: BTreeSet<String> = BTreeSet::new();

        for term in &terms {
            let Ok(pattern) = RegexBuilder::new(&regex::escape(term))
                .case_insensitive(true)
                .build()
            else {
                continue;
            };

            for m in pattern.find_iter(text) {
                matched.insert(term.clone());
                let snippet = self.snippet(text, m.start(), m.end());
                if !snippet.is_empty() && !snippets.contains(&snippet) {
                    snippets.push(snippet);
                }
            }
        }

        let confidence = if terms.is_empty() {
            0.0
        } else {
            (matched.len() as f64 / terms.len() as f64).clamp(0.0, 1.0)
        };

        snippets.truncate(MAX_SNIPPETS);

        EvidenceReport {
            query: query.to_string(),
            found: !snippets.is_empty(),
            evidence: snippets,
            matched_terms: matched.into_iter().collect(),
            confidence,
        }
    }

    /// Answer a question from the text alone.
    ///
    /// YES only when evidence was found and coverage exceeds 0.75.
    pub fn fallback_answer(&self, question: &str, text: &str) -> Answer {
        let report = self.score(question, text);

        if report.found && report.confidence > FALLBACK_YES_THRESHOLD {
            let quote = report
                .evidence
                .first()
                .map(|s| truncate_chars(s, EVIDENCE_CHARS))
                .unwrap_or_default();
            Answer::yes(report.confidence, quote)
        } else {
            Answer::no(
                report.confidence,
                format!("Insufficient evidence (confidence: {:.2})", report.confidence),
            )
        }
    }

    /// Format a report as a tool observation for a reasoning agent.
    pub fn observation(report: &EvidenceReport) -> String {
        if !report.found {
            return "NO EVIDENCE FOUND for this query.".to_string();
        }

        let mut lines = vec![format!(
            "EVIDENCE FOUND (confidence: {:.2}):",
            report.confidence
        )];
        lines.extend(
            report
                .evidence
                .iter()
                .take(OBSERVATION_SNIPPETS)
                .map(|s| format!("- \"{}\"", truncate_chars(s, EVIDENCE_CHARS))),
        );
        lines.join("\n")
    }

    /// Context window of `context_chars` characters around a match, trimmed
    /// to word boundaries.
    fn snippet(&self, text: &str, match_start: usize, match_end: usize) -> String {
        let start = text[..match_start]
            .char_indices()
            .rev()
            .take(self.context_chars)
            .last()
            .map_or(match_start, |(i, _)| i);
        let end = text[match_end..]
            .char_indices()
            .nth(self.context_chars)
            .map_or(text.len(), |(i, _)| match_end + i);

        let mut snippet = text[start..end].trim().to_string();

        if start > 0 {
            if let Some(space) = snippet.find(' ').filter(|&i| i > 0) {
                snippet = format!("...{}", &snippet[space + 1..]);
            }
        }
        if end < text.len() {
            if let Some(space) = snippet.rfind(' ').filter(|&i| i > 0) {
                snippet = format!("{}...", &snippet[..space]);
            }
        }

        snippet
    }
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

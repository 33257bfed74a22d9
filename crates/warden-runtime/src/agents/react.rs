//! ReAct agent: reason, call a tool, observe, repeat.
//!
//! Each model turn is parsed into a [`ReactStep`]. Tool results are fed back
//! as `Observation:` turns until the model answers or the iteration budget
//! runs out. Running out is a failure; the runner then falls back to the
//! evidence scorer.

use async_trait::async_trait;
use backon::Retryable;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use warden_core::evidence::truncate_chars;
use warden_core::threshold::{self, Comparator};
use warden_core::{Answer, EvidenceScorer};

use super::traits::{AgentError, AnswerAgent};
use crate::config::{ReactConfig, RuntimeConfig};
use crate::prompts;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resilience::RetryConfig;

/// Confidence of an explicit `Action: answer`.
const ACTION_ANSWER_CONFIDENCE: f64 = 0.85;

/// Confidence of a bare YES/NO reply, and of a final answer with no stated confidence.
const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Floor applied when a final answer cites found evidence.
const EVIDENCE_CONFIDENCE: f64 = 0.8;

const REASON_CHARS: usize = 300;

lazy_static! {
    static ref ACTION: Regex = Regex::new(r"(?i)Action:\s*(\w+)").unwrap();
    static ref INPUT: Regex = Regex::new(r"(?i)Input:[ \t]*([^\n]*)").unwrap();
    static ref FINAL_ANSWER: Regex =
        Regex::new(r"(?i)(?:FINAL\s+)?ANSWER:\s*(YES|NO)\b").unwrap();
    static ref REASON: Regex = Regex::new(r"(?is)REASON:?\s*(.+?)(?:CONFIDENCE|$)").unwrap();
    static ref CONFIDENCE: Regex = Regex::new(r"(?i)CONFIDENCE:?\s*(\d+(?:\.\d+)?)").unwrap();
    static ref BARE_YES: Regex = Regex::new(r"(?i)\bYES\b").unwrap();
    static ref BARE_NO: Regex = Regex::new(r"(?i)\bNO\b").unwrap();
    static ref NUMBER: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
}

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactStep {
    /// The model answered
    Final(Answer),

    /// `search_evidence` (or `search`) with a query
    Search(String),

    /// `check_threshold` (or `threshold`) with its raw input
    Threshold(String),

    /// An action naming no known tool
    Unknown(String),

    /// No action and no YES/NO in the reply
    Undecided,
}

impl ReactStep {
    pub fn parse(reply: &str) -> Self {
        if let Some(answer) = parse_final_answer(reply) {
            return ReactStep::Final(answer);
        }

        let Some(action) = ACTION.captures(reply).map(|c| c[1].to_lowercase()) else {
            return if BARE_YES.is_match(reply) {
                ReactStep::Final(Answer::yes(DEFAULT_CONFIDENCE, reason_of(reply)))
            } else if BARE_NO.is_match(reply) {
                ReactStep::Final(Answer::no(DEFAULT_CONFIDENCE, reason_of(reply)))
            } else {
                ReactStep::Undecided
            };
        };

        let input = INPUT
            .captures(reply)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();

        match action.as_str() {
            "answer" | "final" => ReactStep::Final(Answer::new(
                input.to_uppercase().contains("YES"),
                ACTION_ANSWER_CONFIDENCE,
                truncate_chars(&input, REASON_CHARS),
            )),
            "search_evidence" | "search" => ReactStep::Search(input),
            "check_threshold" | "threshold" => ReactStep::Threshold(input),
            _ => ReactStep::Unknown(action),
        }
    }
}

/// Parse a `FINAL ANSWER: YES|NO` reply with optional `REASON:` and
/// `CONFIDENCE:` lines.
///
/// Confidences above 1 are read as percentages. A reply that cites found
/// evidence gets at least 0.8.
pub fn parse_final_answer(reply: &str) -> Option<Answer> {
    let verdict = FINAL_ANSWER.captures(reply)?;
    let answer = verdict[1].eq_ignore_ascii_case("YES");

    let reason = REASON
        .captures(reply)
        .map(|c| truncate_chars(c[1].trim(), REASON_CHARS))
        .unwrap_or_default();

    let mut confidence = CONFIDENCE
        .captures(reply)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|c| if c > 1.0 { c / 100.0 } else { c })
        .unwrap_or(DEFAULT_CONFIDENCE);

    let upper = reply.to_uppercase();
    if upper.contains("EVIDENCE FOUND") && !upper.contains("NO EVIDENCE FOUND") {
        confidence = confidence.max(EVIDENCE_CONFIDENCE);
    }

    Some(Answer::new(answer, confidence.clamp(0.0, 1.0), reason))
}

fn reason_of(reply: &str) -> String {
    truncate_chars(reply.trim(), REASON_CHARS)
}

/// Observation for a `check_threshold` call.
fn threshold_observation(input: &str) -> String {
    let numbers: Vec<f64> = NUMBER
        .find_iter(input)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    match numbers.as_slice() {
        [value, limit, ..] => {
            let check = threshold::check(*value, *limit, Comparator::GreaterThan);
            if check.exceeds {
                format!("EXCEEDS: {}% > {}%", value, limit)
            } else {
                format!("OK: {}% <= {}%", value, limit)
            }
        }
        _ => "Error: Need two numbers (value, threshold)".to_string(),
    }
}

/// LLM agent using the ReAct loop with `search_evidence` and `check_threshold`.
pub struct ReactAgent {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    react: ReactConfig,
    retry: RetryConfig,
    scorer: EvidenceScorer,
}

impl ReactAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        let mut completion = CompletionConfig::from(&config.llm).with_stop_sequence("Observation:");
        completion.timeout = config.question_timeout;

        Self {
            provider,
            completion,
            react: config.react.clone(),
            retry: config.retry.clone(),
            scorer: EvidenceScorer::new(),
        }
    }

    pub fn with_scorer(mut self, scorer: EvidenceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Run one completion, retrying transient provider errors.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, AgentError> {
        let provider = &self.provider;
        let completion = &self.completion;
        let call = move || {
            let messages = messages.clone();
            async move { provider.complete(messages, completion).await }
        };

        let response = call
            .retry(self.retry.backoff())
            .sleep(tokio::time::sleep)
            .when(RetryConfig::is_transient)
            .notify(|err, delay| {
                warn!(
                    provider = self.provider.name(),
                    error = %err,
                    ?delay,
                    "Retrying LLM call"
                )
            })
            .await?;

        if response.content.trim().is_empty() {
            return Err(AgentError::Llm("empty completion".to_string()));
        }
        Ok(response.content)
    }

    fn run_tool(&self, step: &ReactStep, question: &str, document: &str) -> String {
        match step {
            ReactStep::Search(query) => {
                let query = if query.is_empty() { question } else { query };
                EvidenceScorer::observation(&self.scorer.score(query, document))
            }
            ReactStep::Threshold(input) => threshold_observation(input),
            ReactStep::Unknown(action) => format!("Unknown tool: {}", action),
            ReactStep::Final(_) | ReactStep::Undecided => String::new(),
        }
    }
}

#[async_trait]
impl AnswerAgent for ReactAgent {
    fn name(&self) -> &str {
        "react"
    }

    async fn answer(&self, question: &str, document: &str) -> Result<Answer, AgentError> {
        let mut messages = vec![ChatMessage::user(prompts::question_prompt(
            question,
            document,
            self.react.excerpt_chars,
        ))];

        for iteration in 1..=self.react.max_iterations {
            let reply = self.complete(messages.clone()).await?;
            let step = ReactStep::parse(&reply);

            debug!(
                iteration,
                reply = %truncate_chars(&reply, 150),
                ?step,
                "ReAct turn"
            );

            match step {
                ReactStep::Final(answer) => return Ok(answer),
                ReactStep::Undecided => return Err(AgentError::NoAnswer),
                _ => {
                    let observation = self.run_tool(&step, question, document);
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(prompts::observation_turn(&observation)));
                }
            }
        }

        Err(AgentError::NoAnswer)
    }

    async fn classify(&self, prompt: &str) -> Result<String, AgentError> {
        let mut config = self.completion.clone();
        config.stop_sequences.clear();
        config.max_tokens = config.max_tokens.min(50);

        let response = self
            .provider
            .complete(vec![ChatMessage::user(prompt)], &config)
            .await?;
        Ok(response.content.trim().to_string())
    }
}

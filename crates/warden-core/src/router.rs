//! Confidence-tiered routing of answers.
//!
//! | tier   | default range | action   |
//! |--------|---------------|----------|
//! | HIGH   | (0.75, 1.0]   | CONTINUE |
//! | MEDIUM | [0.50, 0.75]  | FLAG     |
//! | LOW    | [0, 0.50)     | TERMINATE (or DOWNGRADE under `ASSUME_NO`) |
//!
//! A LOW answer never silently resolves to YES or NO unless the router is
//! explicitly configured to downgrade it.

use serde::{Deserialize, Serialize};

use crate::types::{Answer, ConfidenceTier};
use crate::EngineError;

/// What happens to a LOW-tier answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LowConfidencePolicy {
    /// Stop interrogation and report MISSING_INFO
    #[default]
    Abort,

    /// Record the answer as NO and keep traversing
    AssumeNo,
}

/// Traversal action for a routed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteAction {
    Continue,
    Flag,
    Terminate,
    Downgrade,
}

fn default_high() -> f64 {
    0.75
}

fn default_medium() -> f64 {
    0.50
}

/// Router thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Confidences strictly above this are HIGH
    #[serde(default = "default_high")]
    pub high_threshold: f64,

    /// Confidences at or above this (and not HIGH) are MEDIUM
    #[serde(default = "default_medium")]
    pub medium_threshold: f64,

    #[serde(default)]
    pub low_confidence: LowConfidencePolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high(),
            medium_threshold: default_medium(),
            low_confidence: LowConfidencePolicy::Abort,
        }
    }
}

impl RouterConfig {
    /// Two-tier routing: no MEDIUM band, and anything not HIGH becomes NO.
    pub fn binary() -> Self {
        Self {
            high_threshold: default_high(),
            medium_threshold: default_high(),
            low_confidence: LowConfidencePolicy::AssumeNo,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.high_threshold.is_finite() || !self.medium_threshold.is_finite() {
            return Err(EngineError::InvalidRouterConfig(
                "thresholds must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.medium_threshold)
            || !(0.0..=1.0).contains(&self.high_threshold)
            || self.medium_threshold > self.high_threshold
        {
            return Err(EngineError::InvalidRouterConfig(format!(
                "expected 0 <= medium ({}) <= high ({}) <= 1",
                self.medium_threshold, self.high_threshold
            )));
        }
        Ok(())
    }
}

/// Maps confidences to tiers and tiers to traversal actions.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceRouter {
    config: RouterConfig,
}

impl ConfidenceRouter {
    pub fn new(config: RouterConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Clamp a raw confidence into [0, 1]. Non-finite values become 0.
    pub fn normalize(confidence: f64) -> f64 {
        if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn route(&self, confidence: f64) -> ConfidenceTier {
        let confidence = Self::normalize(confidence);
        let RouterConfig {
            high_threshold: high,
            medium_threshold: medium,
            ..
        } = self.config;

        if confidence > high {
            ConfidenceTier::High
        } else if medium < high && confidence >= medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn action(&self, tier: ConfidenceTier, scenario_matched: bool) -> RouteAction {
        if !scenario_matched {
            return RouteAction::Terminate;
        }

        match tier {
            ConfidenceTier::High => RouteAction::Continue,
            ConfidenceTier::Medium => RouteAction::Flag,
            ConfidenceTier::Low => match self.config.low_confidence {
                LowConfidencePolicy::Abort => RouteAction::Terminate,
                LowConfidencePolicy::AssumeNo => RouteAction::Downgrade,
            },
        }
    }

    /// Rewrite a LOW answer as NO, keeping its confidence and evidence.
    pub fn downgrade(&self, answer: &Answer) -> Answer {
        let confidence = Self::normalize(answer.confidence);
        Answer::no(
            confidence,
            format!(
                "Insufficient confidence ({:.2} <= {:.2}): {}",
                confidence, self.config.high_threshold, answer.evidence
            ),
        )
    }
}

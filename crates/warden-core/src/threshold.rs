//! Numeric threshold checks.
//!
//! Figures extracted from a document (ownership percentages, revenue shares)
//! are compared against compliance limits here rather than by a language model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EngineError;

/// How a value is compared against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[default]
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Comparator::GreaterThan => "greater_than",
            Comparator::LessThan => "less_than",
            Comparator::GreaterOrEqual => "greater_or_equal",
            Comparator::LessOrEqual => "less_or_equal",
        }
    }

    pub fn apply(&self, value: f64, limit: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > limit,
            Comparator::LessThan => value < limit,
            Comparator::GreaterOrEqual => value >= limit,
            Comparator::LessOrEqual => value <= limit,
        }
    }
}

impl FromStr for Comparator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" => Ok(Comparator::GreaterThan),
            "less_than" => Ok(Comparator::LessThan),
            "greater_or_equal" => Ok(Comparator::GreaterOrEqual),
            "less_or_equal" => Ok(Comparator::LessOrEqual),
            other => Err(EngineError::InvalidComparator(other.to_string())),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a threshold comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub value: f64,
    pub limit: f64,
    pub comparator: Comparator,
    pub exceeds: bool,

    /// e.g. `"30 > 25 = true"`
    pub explanation: String,
}

/// Compare `value` against `limit` with a named comparator.
pub fn compare(value: f64, limit: f64, comparator: &str) -> Result<ThresholdCheck, EngineError> {
    let comparator: Comparator = comparator.parse()?;
    Ok(check(value, limit, comparator))
}

/// Compare with an already-parsed comparator.
pub fn check(value: f64, limit: f64, comparator: Comparator) -> ThresholdCheck {
    let exceeds = comparator.apply(value, limit);
    ThresholdCheck {
        value,
        limit,
        comparator,
        exceeds,
        explanation: format!("{} {} {} = {}", value, comparator.symbol(), limit, exceeds),
    }
}

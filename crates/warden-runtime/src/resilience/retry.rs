//! Retry policy for transient provider errors.

use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::human_duration;
use crate::providers::ProviderError;

/// Exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,

    #[serde(with = "human_duration")]
    pub min_delay: Duration,

    #[serde(with = "human_duration")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Whether an error is worth retrying.
    pub fn is_transient(error: &ProviderError) -> bool {
        matches!(
            error,
            ProviderError::RateLimited { .. }
                | ProviderError::Timeout(_)
                | ProviderError::HttpError(_)
        ) || matches!(error, ProviderError::ApiError { status, .. } if *status >= 500)
    }
}

//! Runtime configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty file is valid.
//! Durations are human-readable (`30s`, `500ms`, `1h`).
//!
//! ```yaml
//! question_timeout: 30s
//! concurrency: 4
//! router:
//!   high_threshold: 0.75
//!   medium_threshold: 0.5
//!   low_confidence: ABORT
//! circuit_breaker:
//!   failure_threshold: 3
//!   recovery_timeout: 30s
//! cache:
//!   ttl: 1h
//! llm:
//!   model: claude-sonnet-4-5-20250514
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use warden_core::RouterConfig;

use crate::resilience::{CircuitBreakerConfig, RetryConfig};

/// Errors loading runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// (De)serialize a `Duration` as a humantime string.
pub(crate) mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Answer cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,

    #[serde(with = "human_duration")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// ReAct loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactConfig {
    /// Model turns before the agent gives up
    pub max_iterations: u32,

    /// Document characters included in the prompt
    pub excerpt_chars: usize,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            excerpt_chars: 2000,
        }
    }
}

/// LLM completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens per call
    pub max_tokens: u32,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Provider settings (`api_key`, `base_url`); the key falls back to the environment
    pub provider: serde_json::Value,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 500,
            temperature: 0.0,
            provider: serde_json::Value::Object(Default::default()),
        }
    }
}

/// Configuration for the case runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Per-question answer timeout
    #[serde(with = "human_duration")]
    pub question_timeout: Duration,

    /// Cases evaluated concurrently in a batch
    pub concurrency: usize,

    pub router: RouterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub react: ReactConfig,
    pub llm: LlmConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            question_timeout: Duration::from_secs(30),
            concurrency: 4,
            router: RouterConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            react: ReactConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.react.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "react.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.question_timeout.is_zero() {
            return Err(ConfigError::Invalid("question_timeout must be positive".to_string()));
        }
        self.router
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

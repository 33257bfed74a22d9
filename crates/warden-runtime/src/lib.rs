//! # warden-runtime
//!
//! Async evaluation for Warden.
//!
//! `warden-core` decides what happens after a question has been answered.
//! This crate answers the questions: an [`AnswerAgent`] (an LLM running a
//! ReAct loop, or the offline evidence scorer) is called for each pending
//! node with a timeout, behind a circuit breaker and an answer cache. The
//! [`CaseRunner`] evaluates single documents or whole batches on a bounded
//! pool of tokio tasks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_core::{Document, ScenarioRegistry};
//! use warden_runtime::{CaseRunner, RuntimeConfig};
//!
//! let registry = Arc::new(ScenarioRegistry::load_dir("scenarios")?);
//! let runner = CaseRunner::builder()
//!     .registry(registry)
//!     .config(RuntimeConfig::from_yaml_file("warden.yaml")?)
//!     .build()?;
//!
//! let cases = runner.run_batch(documents).await;
//! ```

pub mod agents;
pub mod cache;
pub mod config;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod runner;

pub use agents::{AgentError, AnswerAgent, ReactAgent, ScorerAgent};
pub use cache::AnswerCache;
pub use config::{CacheConfig, ConfigError, LlmConfig, ReactConfig, RuntimeConfig};
pub use providers::{LlmProvider, ProviderError};
pub use runner::{CaseRunner, CaseRunnerBuilder, RuntimeError};

#[cfg(feature = "anthropic")]
pub use providers::AnthropicProvider;

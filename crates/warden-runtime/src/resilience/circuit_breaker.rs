//! Circuit breaker for answer agents.
//!
//! When an agent fails repeatedly the circuit opens and questions go straight
//! to the evidence scorer until the recovery timeout elapses.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::human_duration;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time before a half-open probe is allowed
    #[serde(with = "human_duration")]
    pub recovery_timeout: Duration,

    /// Probe successes needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one agent's circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Agent is skipped
    Open { opened_at: Instant },

    /// Probing whether the agent has recovered
    HalfOpen { successes: u32 },
}

/// Per-agent circuit breaker, keyed by agent name.
#[derive(Debug)]
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `agent` should be skipped.
    ///
    /// An open circuit whose recovery timeout has passed moves to half-open
    /// and lets the call through.
    pub fn is_open(&self, agent: &str) -> bool {
        let mut states = self.states.write();
        match states.get(agent) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    states.insert(agent.to_string(), CircuitState::HalfOpen { successes: 0 });
                    tracing::info!(agent, "Circuit half-open, probing agent");
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, agent: &str) {
        let mut states = self.states.write();
        match states.get(agent).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(agent.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(agent, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        agent.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { failures }) if failures > 0 => {
                states.insert(agent.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, agent: &str) {
        let mut states = self.states.write();
        let failures = match states.get(agent) {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    agent.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(agent, "Circuit reopened after failed probe");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                agent.to_string(),
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(agent, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(agent.to_string(), CircuitState::Closed { failures });
        }
    }

    pub fn state(&self, agent: &str) -> CircuitState {
        self.states
            .read()
            .get(agent)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Close every circuit.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(failure_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout: Duration::from_millis(20),
            success_threshold: 1,
        })
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open("react"));
        assert_eq!(cb.state("react"), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = quick(2);
        cb.record_failure("react");
        assert!(!cb.is_open("react"));
        cb.record_failure("react");
        assert!(cb.is_open("react"));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();
        cb.record_failure("react");
        cb.record_failure("react");
        cb.record_success("react");
        cb.record_failure("react");
        cb.record_failure("react");
        assert!(!cb.is_open("react"));
    }

    #[test]
    fn test_agents_are_independent() {
        let cb = quick(1);
        cb.record_failure("react");
        assert!(cb.is_open("react"));
        assert!(!cb.is_open("scorer"));
    }

    #[test]
    fn test_half_open_recovery() {
        let cb = quick(1);
        cb.record_failure("react");
        assert!(cb.is_open("react"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(!cb.is_open("react"));
        assert_eq!(cb.state("react"), CircuitState::HalfOpen { successes: 0 });

        cb.record_success("react");
        assert_eq!(cb.state("react"), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_failed_probe_reopens() {
        let cb = quick(1);
        cb.record_failure("react");
        std::thread::sleep(Duration::from_millis(30));
        assert!(!cb.is_open("react"));

        cb.record_failure("react");
        assert!(cb.is_open("react"));
    }
}

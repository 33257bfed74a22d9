//! Resilience patterns for the case runner.
//!
//! - Circuit breaker: stop calling an agent that keeps failing
//! - Retry with backoff for transient provider errors

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::RetryConfig;

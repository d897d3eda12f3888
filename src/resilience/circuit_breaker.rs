//! Circuit breaker for endpoint protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: target assumed down, requests fail fast
//! - Half-Open: trial requests allowed to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: on read, once recovery_timeout has elapsed since the last failure
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - No background timer; Open → Half-Open happens lazily on read
//! - One mutex per breaker so unrelated breakers never contend
//! - Usable client-wide or per endpoint

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{secs, CircuitBreakerConfig};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        success_threshold: u32,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(
            name,
            config.failure_threshold,
            config.success_threshold,
            secs(config.recovery_timeout_secs),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, moving Open → Half-Open if the recovery timeout elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.refresh(&mut inner);
        inner.state
    }

    /// True unless the breaker is open.
    pub fn allows_requests(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    tracing::info!(breaker = %self.name, "Circuit breaker closed");
                }
            }
            // Late completions of calls started before the breaker opened.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.refresh(&mut inner);
        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                inner.last_failure = Some(now);
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        recovery_timeout = ?self.recovery_timeout,
                        "Circuit breaker opened"
                    );
                    metrics::counter!("client_circuit_opened_total").increment(1);
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                inner.last_failure = Some(now);
                tracing::warn!(breaker = %self.name, "Circuit breaker reopened by failed trial call");
                metrics::counter!("client_circuit_opened_total").increment(1);
            }
            CircuitState::Open => {
                inner.failure_count += 1;
                inner.last_failure = Some(now);
            }
        }
    }

    /// Force the breaker back to Closed with cleared counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().expect("circuit breaker mutex poisoned").failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.inner.lock().expect("circuit breaker mutex poisoned").success_count
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .last_failure
            .map(|at| Instant::now().saturating_duration_since(at))
            .unwrap_or(Duration::MAX);
        if elapsed > self.recovery_timeout {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            tracing::info!(breaker = %self.name, "Circuit breaker half-open, allowing trial calls");
        }
    }
}

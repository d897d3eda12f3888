//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether an attempt outcome is worth retrying
//! - Compute the delay before the next attempt
//! - Describe each attempt for logs and diagnostics
//!
//! # Design Decisions
//! - Immutable after construction; shared read-only across requests
//! - Connection errors are classified by category, statuses by code
//! - The attempt budget is checked before the outcome

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;

use crate::config::RetryConfig;
use crate::error::{ErrorCategory, TransportError};
use crate::resilience::backoff::{Backoff, BackoffStrategy};

/// The observed result of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint answered with this status.
    Status(u16),
    /// The transport failed with this category.
    Error(ErrorCategory),
    /// The transport failed in a way that has no retry category.
    Fatal,
}

impl From<&TransportError> for Outcome {
    fn from(err: &TransportError) -> Self {
        err.category().map(Outcome::Error).unwrap_or(Outcome::Fatal)
    }
}

/// Retry decision and delay curve for a client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff: Backoff,
    max_attempts: u32,
    retryable_statuses: HashSet<u16>,
    retryable_errors: HashSet<ErrorCategory>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Build a policy from its config section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            backoff: Backoff {
                strategy: config.strategy.into(),
                base_delay: config.base_delay_secs,
                max_delay: config.max_delay_secs,
                exponential_base: config.exponential_base,
                jitter: config.jitter,
                jitter_range: config.jitter_range,
            },
            max_attempts: config.max_attempts.max(1),
            retryable_statuses: config.retryable_status_codes.iter().copied().collect(),
            retryable_errors: config.retryable_errors.iter().copied().collect(),
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff.strategy = strategy;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set base and max delay.
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.backoff.base_delay = base.as_secs_f64();
        self.backoff.max_delay = max.as_secs_f64();
        self
    }

    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.backoff.exponential_base = base;
        self
    }

    /// Enable jitter with the given amplitude, or disable it with `None`.
    pub fn with_jitter(mut self, range: Option<f64>) -> Self {
        match range {
            Some(range) => {
                self.backoff.jitter = true;
                self.backoff.jitter_range = range;
            }
            None => self.backoff.jitter = false,
        }
        self
    }

    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_retryable_errors(
        mut self,
        errors: impl IntoIterator<Item = ErrorCategory>,
    ) -> Self {
        self.retryable_errors = errors.into_iter().collect();
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Delay to wait after `attempt` (1-based) before the next one.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.backoff.calculate_delay(attempt)
    }

    /// Whether `outcome` is in the retryable sets, ignoring the budget.
    pub fn is_retryable(&self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Status(status) => self.retryable_statuses.contains(&status),
            Outcome::Error(category) => self.retryable_errors.contains(&category),
            Outcome::Fatal => false,
        }
    }

    /// Whether another attempt should follow `attempt`.
    pub fn should_retry(&self, attempt: u32, outcome: Outcome) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        self.is_retryable(outcome)
    }
}

/// Per-attempt record kept for logs and returned with responses.
#[derive(Debug, Clone, Serialize)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Endpoint the attempt was sent to.
    pub endpoint: String,
    /// Status, when the endpoint answered.
    pub status: Option<u16>,
    /// Transport error text, when it did not.
    pub error: Option<String>,
    /// Delay slept after this attempt (zero for the last one).
    pub delay: Duration,
    /// Time spent on the attempt itself.
    pub elapsed: Duration,
    /// Wall-clock time the attempt started, in milliseconds since the epoch.
    pub started_at_ms: u64,
}

impl RetryAttempt {
    pub(crate) fn new(attempt: u32, endpoint: &str) -> Self {
        let started_at_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            attempt,
            endpoint: endpoint.to_string(),
            status: None,
            error: None,
            delay: Duration::ZERO,
            elapsed: Duration::ZERO,
            started_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(3)
            .with_retryable_statuses([500, 503])
            .with_retryable_errors([ErrorCategory::Connect, ErrorCategory::Timeout])
    }

    #[test]
    fn test_retryable_status() {
        let p = policy();
        assert!(p.should_retry(1, Outcome::Status(503)));
        assert!(p.should_retry(2, Outcome::Status(500)));
        assert!(!p.should_retry(1, Outcome::Status(404)));
        assert!(!p.should_retry(1, Outcome::Status(502)));
    }

    #[test]
    fn test_retryable_errors() {
        let p = policy();
        assert!(p.should_retry(1, Outcome::Error(ErrorCategory::Connect)));
        assert!(!p.should_retry(1, Outcome::Error(ErrorCategory::Network)));
        assert!(!p.should_retry(1, Outcome::Fatal));
        assert_eq!(
            Outcome::from(&TransportError::InvalidRequest("bad uri".into())),
            Outcome::Fatal
        );
    }

    #[test]
    fn test_budget_exhausted_never_retries() {
        let p = policy();
        for attempt in 3..10 {
            assert!(!p.should_retry(attempt, Outcome::Status(503)));
            assert!(!p.should_retry(attempt, Outcome::Error(ErrorCategory::Connect)));
        }
    }

    #[test]
    fn test_max_attempts_floor() {
        let p = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(p.max_attempts(), 1);
        assert!(!RetryPolicy::no_retry().should_retry(1, Outcome::Status(503)));
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            base_delay_secs: 0.5,
            jitter: false,
            ..RetryConfig::default()
        };
        let p = RetryPolicy::from_config(&config);
        assert_eq!(p.calculate_delay(1), Duration::from_millis(500));
        assert_eq!(p.calculate_delay(2), Duration::from_secs(1));
        assert!(p.should_retry(1, Outcome::Status(429)));
        assert!(p.should_retry(1, Outcome::Error(ErrorCategory::Network)));
    }
}

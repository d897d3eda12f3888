//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → circuit_breaker.rs (fail fast while the target is assumed down)
//!     → timeouts.rs (per-attempt timeout, whole-call deadline)
//!     → On failure: retries.rs (classify outcome, check attempt budget)
//!     → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retry decisions are pure functions of configuration and outcome
//! - Circuit breaker prevents cascading failures

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::{Backoff, BackoffStrategy};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use retries::{Outcome, RetryAttempt, RetryPolicy};

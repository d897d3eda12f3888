//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Interval tick (BackgroundTask owned by the LoadBalancer)
//!     → Probe every endpoint concurrently
//!     → Classify via state.rs (2xx healthy, 4xx degraded, else unhealthy)
//!     → Failure streak ≥ threshold → open the endpoint circuit
//!
//! Request outcomes (executor):
//!     → Endpoint success/failure counters and streaks
//!     → Client-wide circuit breaker (resilience/)
//! ```
//!
//! # Design Decisions
//! - One probe per endpoint per round, isolated from its siblings
//! - A failed round never ends the loop; it pauses and tries again
//! - Health state is per-endpoint, not per-client

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::HealthState;

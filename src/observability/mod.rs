//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (request sent, retry scheduled, breaker opened, ...)
//!     → metrics facade (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs (stdout, pretty or JSON)
//!     → metrics.rs (Prometheus scrape endpoint, MetricsRegistry snapshots)
//! ```
//!
//! # Design Decisions
//! - Emission is fire-and-forget; it never fails or blocks a request
//! - The request ID is attached to every event of a call

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, ClientMetrics, EndpointMetrics, MetricsRegistry};

//! Network resource subsystem.
//!
//! # Data Flow
//! ```text
//! [pool] config section (expected rps, latency, ceilings)
//!     → pool.rs (Little's Law sizing)
//!     → HyperTransport (in-flight semaphore, idle keep-alive per host)
//! ```
//!
//! # Design Decisions
//! - Sizing is a pure policy; sockets belong to the HTTP client primitive

pub mod pool;

pub use pool::{ConnectionPoolSizer, PoolRecommendation};

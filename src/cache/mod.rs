//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! GET call (cache enabled, not overridden)
//!     → response.rs lookup by path + query
//!         hit  → return immediately (no breaker, balancer, or network)
//!         miss → execute → store on success
//! ```
//!
//! # Design Decisions
//! - Keys are endpoint independent: any endpoint's answer serves the next call
//! - TTL is reported, never enforced; callers decide what stale means

pub mod response;

pub use response::{CachedResponse, ResponseCache};

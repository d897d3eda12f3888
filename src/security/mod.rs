//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → rate_limit.rs (wait for a token, once per call)
//!     → [attempt loop]
//!         → auth.rs (bearer token interceptor, once per attempt)
//! ```
//!
//! # Design Decisions
//! - The limiter delays rather than rejects: it protects the remote side
//! - Credentials are marked sensitive so they never show up in debug output

pub mod auth;
pub mod rate_limit;

pub use auth::BearerAuth;
pub use rate_limit::RateLimiter;

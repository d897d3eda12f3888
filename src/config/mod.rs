//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → ServiceClient builder turns sections into components
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; endpoints change through the client API
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, BackoffKind, CacheConfig, CircuitBreakerConfig, ClientConfig,
    EndpointConfig, HealthCheckConfig, LoadBalancerConfig, LogFormat, ObservabilityConfig,
    PoolConfig, RateLimitConfig, RetryConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};

use std::time::Duration;

/// Convert a seconds value from config into a `Duration`, treating
/// negative or non-finite input as zero.
pub fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

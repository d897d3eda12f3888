//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;
use crate::load_balancer::Strategy;

/// Root configuration for a resilient service client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate endpoints registered at construction.
    pub endpoints: Vec<EndpointConfig>,

    /// Endpoint selection and background health checking.
    pub load_balancer: LoadBalancerConfig,

    /// Retry and backoff policy.
    pub retries: RetryConfig,

    /// Client-wide circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Client-wide token bucket.
    pub rate_limit: RateLimitConfig,

    /// Response cache for idempotent GETs.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Connection pool sizing inputs.
    pub pool: PoolConfig,

    /// Headers added to every request unless the request sets them.
    pub headers: BTreeMap<String, String>,

    /// Outbound authentication.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// A single candidate backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Base URL (e.g., "http://10.0.0.5:8080").
    pub url: String,

    /// Static weight for weighted strategies (default: 1.0).
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Selection strategy.
    pub strategy: Strategy,

    /// Background health checking.
    pub health_check: HealthCheckConfig,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background health-check loop.
    pub enabled: bool,

    /// Interval between probe rounds in seconds.
    pub interval_secs: f64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: f64,

    /// Path probed on every endpoint.
    pub path: String,

    /// Consecutive probe failures before the endpoint circuit opens.
    pub failure_threshold: u32,

    /// How long an endpoint circuit stays open, in seconds.
    pub circuit_timeout_secs: f64,

    /// Pause after a failed probe round before the loop resumes.
    pub retry_pause_secs: f64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30.0,
            timeout_secs: 5.0,
            path: "/health".to_string(),
            failure_threshold: 3,
            circuit_timeout_secs: 60.0,
            retry_pause_secs: 5.0,
        }
    }
}

/// Backoff strategies expressible in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
    #[default]
    Exponential,
    Fibonacci,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay growth strategy.
    pub strategy: BackoffKind,

    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Base delay in seconds.
    pub base_delay_secs: f64,

    /// Ceiling for any single delay in seconds.
    pub max_delay_secs: f64,

    /// Growth factor for the exponential strategy.
    pub exponential_base: f64,

    /// Randomize delays to avoid synchronized retries.
    pub jitter: bool,

    /// Jitter amplitude as a fraction of the delay (0..1).
    pub jitter_range: f64,

    /// Statuses that trigger a retry.
    pub retryable_status_codes: Vec<u16>,

    /// Transport failure categories that trigger a retry.
    pub retryable_errors: Vec<ErrorCategory>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffKind::Exponential,
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 60.0,
            exponential_base: 2.0,
            jitter: true,
            jitter_range: 0.1,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504],
            retryable_errors: vec![
                ErrorCategory::Connect,
                ErrorCategory::Timeout,
                ErrorCategory::Network,
            ],
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the client-wide breaker.
    pub enabled: bool,

    /// Failures in CLOSED before opening.
    pub failure_threshold: u32,

    /// Successes in HALF_OPEN before closing.
    pub success_threshold: u32,

    /// Seconds spent OPEN before a trial call is allowed.
    pub recovery_timeout_secs: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout_secs: 60.0,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Steady-state refill rate.
    pub requests_per_second: f64,

    /// Bucket capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100.0,
            burst_size: 50,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache successful GET responses.
    pub enabled: bool,

    /// Maximum cached entries.
    pub max_size: usize,

    /// Advisory freshness horizon in seconds. Not enforced by the cache.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: 1000,
            ttl_secs: 300,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: f64,

    /// Default per-attempt timeout in seconds.
    pub request_secs: f64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10.0,
            request_secs: 30.0,
            idle_secs: 90,
        }
    }
}

/// Inputs to connection pool sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Expected steady-state requests per second.
    pub expected_rps: f64,

    /// Expected average response time in milliseconds.
    pub avg_response_time_ms: f64,

    /// Hard ceiling on concurrent connections.
    pub max_connections: usize,

    /// Hard ceiling on idle keep-alive connections per host.
    pub max_keepalive_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            expected_rps: 100.0,
            avg_response_time_ms: 200.0,
            max_connections: 100,
            max_keepalive_connections: 20,
        }
    }
}

/// Outbound authentication.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token added to every request when set.
    pub bearer_token: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

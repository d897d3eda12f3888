//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and endpoint URLs.
//! All violations are returned, not just the first.

use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (i, endpoint) in config.endpoints.iter().enumerate() {
        let field = format!("endpoints[{}]", i);
        match Url::parse(&endpoint.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("{}.url", field),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(format!("{}.url", field), e.to_string())),
        }
        if !(endpoint.weight > 0.0) {
            errors.push(ValidationError::new(
                format!("{}.weight", field),
                "must be greater than 0",
            ));
        }
    }

    let retries = &config.retries;
    if retries.max_attempts < 1 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !(retries.base_delay_secs > 0.0) {
        errors.push(ValidationError::new("retries.base_delay_secs", "must be greater than 0"));
    }
    if !(retries.max_delay_secs >= retries.base_delay_secs) {
        errors.push(ValidationError::new(
            "retries.max_delay_secs",
            "must be greater than or equal to base_delay_secs",
        ));
    }
    if !(retries.exponential_base > 1.0) {
        errors.push(ValidationError::new("retries.exponential_base", "must be greater than 1"));
    }
    if !(0.0..1.0).contains(&retries.jitter_range) {
        errors.push(ValidationError::new("retries.jitter_range", "must be within [0, 1)"));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold < 1 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be at least 1"));
    }
    if breaker.success_threshold < 1 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be at least 1"));
    }
    if !(breaker.recovery_timeout_secs >= 0.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.recovery_timeout_secs",
            "must not be negative",
        ));
    }

    if config.rate_limit.enabled {
        if !(config.rate_limit.requests_per_second > 0.0) {
            errors.push(ValidationError::new(
                "rate_limit.requests_per_second",
                "must be greater than 0",
            ));
        }
        if config.rate_limit.burst_size < 1 {
            errors.push(ValidationError::new("rate_limit.burst_size", "must be at least 1"));
        }
    }

    if config.cache.max_size < 1 {
        errors.push(ValidationError::new("cache.max_size", "must be at least 1"));
    }

    let health = &config.load_balancer.health_check;
    if !(health.interval_secs > 0.0) {
        errors.push(ValidationError::new(
            "load_balancer.health_check.interval_secs",
            "must be greater than 0",
        ));
    }
    if !(health.timeout_secs > 0.0) {
        errors.push(ValidationError::new(
            "load_balancer.health_check.timeout_secs",
            "must be greater than 0",
        ));
    }
    if health.failure_threshold < 1 {
        errors.push(ValidationError::new(
            "load_balancer.health_check.failure_threshold",
            "must be at least 1",
        ));
    }
    if !health.path.starts_with('/') {
        errors.push(ValidationError::new(
            "load_balancer.health_check.path",
            "must start with '/'",
        ));
    }

    if !(config.timeouts.request_secs > 0.0) {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if !(config.timeouts.connect_secs > 0.0) {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

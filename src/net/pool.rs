//! Connection pool sizing.
//!
//! # Responsibilities
//! - Turn expected load into a connection and keep-alive recommendation
//!
//! # Design Decisions
//! - Little's Law: concurrency ≈ arrival rate × service time, plus 20% headroom
//! - Hard ceilings always win over the computed value

use serde::Serialize;

use crate::config::PoolConfig;

/// Headroom applied on top of the Little's Law estimate.
pub const SAFETY_FACTOR: f64 = 1.2;

/// Output of [`ConnectionPoolSizer::recommend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolRecommendation {
    pub max_connections: usize,
    pub max_keepalive_connections: usize,
}

/// Pure sizing policy for the outbound connection pool.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionPoolSizer {
    connection_ceiling: usize,
    keepalive_ceiling: usize,
}

impl ConnectionPoolSizer {
    pub fn new(connection_ceiling: usize, keepalive_ceiling: usize) -> Self {
        Self {
            connection_ceiling,
            keepalive_ceiling,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.max_connections, config.max_keepalive_connections)
    }

    /// Recommend pool limits for `expected_rps` at `avg_response_time_secs`.
    ///
    /// Negative or non-finite inputs count as no load.
    pub fn recommend(&self, expected_rps: f64, avg_response_time_secs: f64) -> PoolRecommendation {
        let estimate = (expected_rps * avg_response_time_secs * SAFETY_FACTOR).round();
        let connections = if estimate.is_finite() && estimate > 0.0 {
            // `as` saturates, then the ceiling applies.
            (estimate as usize).min(self.connection_ceiling)
        } else {
            0
        };
        PoolRecommendation {
            max_connections: connections,
            max_keepalive_connections: (connections / 2).min(self.keepalive_ceiling),
        }
    }

    /// Recommendation for the load described in `config`.
    pub fn recommend_for(config: &PoolConfig) -> PoolRecommendation {
        Self::from_config(config).recommend(config.expected_rps, config.avg_response_time_ms / 1000.0)
    }
}

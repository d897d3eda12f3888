//! Endpoint health states.
//!
//! # States
//! - Healthy: probe answered 2xx, endpoint receives traffic
//! - Degraded: probe answered 4xx, endpoint still receives traffic
//! - Unhealthy: probe failed or answered anything else, excluded from selection
//! - Unknown: set explicitly; excluded until a probe classifies the endpoint
//!
//! # Design Decisions
//! - Newly registered endpoints start Healthy so traffic flows before the first probe
//! - Repeated unhealthy probes open the endpoint circuit (see health/active.rs)

use serde::{Deserialize, Serialize};

/// Health of a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl HealthState {
    /// Classify a probe response status.
    pub fn from_probe_status(status: u16) -> Self {
        match status {
            200..=299 => HealthState::Healthy,
            400..=499 => HealthState::Degraded,
            _ => HealthState::Unhealthy,
        }
    }

    /// Whether an endpoint in this state may be selected.
    pub fn accepts_traffic(self) -> bool {
        matches!(self, HealthState::Healthy | HealthState::Degraded)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

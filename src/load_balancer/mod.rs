//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request attempt
//!     → balancer.rs (snapshot the registry, keep available endpoints)
//!     → Apply the configured strategy:
//!         - round_robin.rs (rotate through endpoints)
//!         - weighted.rs (smooth weighted round robin, weighted random)
//!         - least_conn.rs (fewest in-flight requests)
//!         - response_time.rs (lowest average latency)
//!         - random.rs (uniform choice)
//!     → endpoint.rs (count the request start, hand back a guard)
//! ```
//!
//! # Design Decisions
//! - Strategies only choose; the registry and its health loop live in balancer.rs
//! - Strategy chosen once per balancer from the `Strategy` enum
//! - Unavailable endpoints are filtered before the strategy runs
//! - Registry reads are lock-free snapshots, so add/remove never blocks selection

pub mod balancer;
pub mod endpoint;
pub mod least_conn;
pub mod random;
pub mod response_time;
pub mod round_robin;
pub mod weighted;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use balancer::LoadBalancer;
pub use endpoint::{EndpointGuard, EndpointSnapshot, ServiceEndpoint};

/// Picks one endpoint from a non-empty healthy set.
pub trait Selector: Send + Sync + fmt::Debug {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>>;

    /// Drop any per-endpoint state kept for `url`.
    fn forget(&self, _url: &str) {}
}

/// Available selection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    LeastResponseTime,
    Random,
    WeightedRandom,
}

impl Strategy {
    /// Build the selector implementing this strategy.
    pub fn selector(self) -> Box<dyn Selector> {
        match self {
            Strategy::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            Strategy::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
            Strategy::LeastConnections => Box::new(least_conn::LeastConnections::new()),
            Strategy::LeastResponseTime => Box::new(response_time::LeastResponseTime::new()),
            Strategy::Random => Box::new(random::RandomSelector::new()),
            Strategy::WeightedRandom => Box::new(weighted::WeightedRandom::new()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::RoundRobin => "round_robin",
            Strategy::WeightedRoundRobin => "weighted_round_robin",
            Strategy::LeastConnections => "least_connections",
            Strategy::LeastResponseTime => "least_response_time",
            Strategy::Random => "random",
            Strategy::WeightedRandom => "weighted_random",
        };
        f.write_str(name)
    }
}

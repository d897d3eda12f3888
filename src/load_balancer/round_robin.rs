//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::ServiceEndpoint, Selector};

/// Round-robin selector.
/// Stores an internal counter to rotate through the healthy endpoints.
///
/// The counter is never reset when the healthy set changes size, so the
/// rotation position drifts after health transitions. That is expected.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>> {
        if healthy.is_empty() {
            return None;
        }
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        healthy.get(count % healthy.len()).cloned()
    }
}

//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::ServiceEndpoint, Selector};

/// Least connections selector.
/// Selects the endpoint with the minimum number of in-flight requests.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for LeastConnections {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>> {
        // In case of tie, the first one is selected (stability)
        healthy
            .iter()
            .min_by_key(|ep| ep.active_connections())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::endpoints;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let eps = endpoints(&[1.0, 1.0]);

        // artificially increase connections on the first endpoint
        let _g1 = eps[0].record_request_start();

        let s1 = lb.select(&eps).unwrap();
        assert_eq!(s1.url(), eps[1].url());

        let _g2 = eps[1].record_request_start();
        let _g3 = eps[1].record_request_start();

        let s2 = lb.select(&eps).unwrap();
        assert_eq!(s2.url(), eps[0].url());
    }

    #[test]
    fn test_tie_prefers_first() {
        let lb = LeastConnections::new();
        let eps = endpoints(&[1.0, 1.0, 1.0]);
        assert_eq!(lb.select(&eps).unwrap().url(), eps[0].url());
    }
}

//! Least response time load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::ServiceEndpoint, Selector};

/// Picks the endpoint with the lowest average response time.
///
/// Only endpoints with at least one completed request compete. While none
/// has history, the first healthy endpoint is used.
#[derive(Debug, Default)]
pub struct LeastResponseTime;

impl LeastResponseTime {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for LeastResponseTime {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>> {
        healthy
            .iter()
            .filter(|ep| ep.has_response_history())
            .min_by_key(|ep| ep.average_response_time())
            .or_else(|| healthy.first())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::load_balancer::tests::endpoints;

    #[test]
    fn test_cold_start_uses_first() {
        let lb = LeastResponseTime::new();
        let eps = endpoints(&[1.0, 1.0]);
        assert_eq!(lb.select(&eps).unwrap().url(), eps[0].url());
    }

    #[test]
    fn test_prefers_fastest_with_history() {
        let lb = LeastResponseTime::new();
        let eps = endpoints(&[1.0, 1.0, 1.0]);
        eps[0].record_request_start().finish(true, Duration::from_millis(300));
        eps[1].record_request_start().finish(true, Duration::from_millis(40));
        // eps[2] has no history and is not a candidate
        assert_eq!(lb.select(&eps).unwrap().url(), eps[1].url());
    }

    #[test]
    fn test_failures_do_not_count_as_history() {
        let lb = LeastResponseTime::new();
        let eps = endpoints(&[1.0, 1.0]);
        eps[0].record_request_start().finish(true, Duration::from_millis(500));
        eps[1].record_request_start().finish(false, Duration::from_millis(1));
        assert_eq!(lb.select(&eps).unwrap().url(), eps[0].url());
    }
}

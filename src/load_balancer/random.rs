//! Uniform random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::ServiceEndpoint, Selector};

/// Picks any healthy endpoint with equal probability.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for RandomSelector {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>> {
        if healthy.is_empty() {
            return None;
        }
        healthy.get(fastrand::usize(..healthy.len())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::endpoints;

    #[test]
    fn test_random_covers_all() {
        let lb = RandomSelector::new();
        let eps = endpoints(&[1.0; 4]);
        let mut seen = vec![0usize; 4];
        for _ in 0..4_000 {
            let picked = lb.select(&eps).unwrap();
            let idx = eps.iter().position(|ep| ep.url() == picked.url()).unwrap();
            seen[idx] += 1;
        }
        for count in seen {
            assert!((800..1200).contains(&count), "count {}", count);
        }
        assert!(lb.select(&[]).is_none());
    }
}

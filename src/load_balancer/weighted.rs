//! Weight-aware load balancing strategies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::load_balancer::{endpoint::ServiceEndpoint, Selector};

/// Integer-scaled weight used by the smooth weighted round robin.
fn scaled_weight(ep: &ServiceEndpoint) -> i64 {
    ((ep.weight() * 100.0).round() as i64).max(1)
}

/// Smooth weighted round robin.
///
/// Every call adds each healthy endpoint's scaled weight to its accumulator,
/// picks the largest accumulator, then subtracts the healthy total from the
/// winner. Accumulators are keyed by URL and survive health changes, so the
/// proportions skew briefly after the healthy set changes size.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    current: Mutex<HashMap<String, i64>>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for WeightedRoundRobin {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>> {
        if healthy.is_empty() {
            return None;
        }
        let mut current = self.current.lock().expect("weighted round robin mutex poisoned");
        let total: i64 = healthy.iter().map(|ep| scaled_weight(ep)).sum();

        let mut best: Option<(&Arc<ServiceEndpoint>, i64)> = None;
        for ep in healthy {
            let acc = current.entry(ep.url().to_string()).or_insert(0);
            *acc += scaled_weight(ep);
            if best.map_or(true, |(_, value)| *acc > value) {
                best = Some((ep, *acc));
            }
        }

        let (winner, _) = best?;
        if let Some(acc) = current.get_mut(winner.url().as_str()) {
            *acc -= total;
        }
        Some(Arc::clone(winner))
    }

    fn forget(&self, url: &str) {
        self.current
            .lock()
            .expect("weighted round robin mutex poisoned")
            .remove(url);
    }
}

/// Weighted random: one uniform draw in `[0, total_weight)` scanned
/// against cumulative weights.
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for WeightedRandom {
    fn select(&self, healthy: &[Arc<ServiceEndpoint>]) -> Option<Arc<ServiceEndpoint>> {
        let total: f64 = healthy.iter().map(|ep| ep.weight()).sum();
        if !(total > 0.0) {
            return healthy.first().cloned();
        }
        let draw = fastrand::f64() * total;
        let mut cumulative = 0.0;
        for ep in healthy {
            cumulative += ep.weight();
            if draw < cumulative {
                return Some(Arc::clone(ep));
            }
        }
        // Float rounding can leave the draw just past the last bound.
        healthy.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::endpoints;

    fn tally(lb: &dyn Selector, eps: &[Arc<ServiceEndpoint>], calls: usize) -> Vec<usize> {
        let mut counts = vec![0; eps.len()];
        for _ in 0..calls {
            let picked = lb.select(eps).unwrap();
            let idx = eps.iter().position(|ep| ep.url() == picked.url()).unwrap();
            counts[idx] += 1;
        }
        counts
    }

    #[test]
    fn test_weighted_round_robin_exact_proportions() {
        let lb = WeightedRoundRobin::new();
        let eps = endpoints(&[1.0, 3.0]);
        assert_eq!(tally(&lb, &eps, 4), vec![1, 3]);
        assert_eq!(tally(&lb, &eps, 400), vec![100, 300]);
    }

    #[test]
    fn test_weighted_round_robin_is_smooth() {
        let lb = WeightedRoundRobin::new();
        let eps = endpoints(&[5.0, 1.0, 1.0]);
        let order: Vec<usize> = (0..7)
            .map(|_| {
                let picked = lb.select(&eps).unwrap();
                eps.iter().position(|ep| ep.url() == picked.url()).unwrap()
            })
            .collect();
        // Nginx-style interleaving rather than five picks in a row.
        assert_eq!(order, vec![0, 0, 1, 0, 2, 0, 0]);
    }

    #[test]
    fn test_forgotten_endpoint_starts_fresh() {
        let lb = WeightedRoundRobin::new();
        let eps = endpoints(&[1.0, 3.0]);
        // Leaves the light endpoint's accumulator at +100.
        lb.select(&eps);
        lb.forget(eps[0].url().as_str());
        assert_eq!(lb.current.lock().unwrap().len(), 1);
        // Back from zero, the heavy endpoint wins the next pick again.
        assert_eq!(lb.select(&eps).unwrap().url(), eps[1].url());
    }

    #[test]
    fn test_weighted_random_ratio() {
        let lb = WeightedRandom::new();
        let eps = endpoints(&[1.0, 3.0]);
        let counts = tally(&lb, &eps, 10_000);
        let ratio = counts[0] as f64 / 10_000.0;
        assert!((ratio - 0.25).abs() < 0.03, "ratio {}", ratio);
    }

    #[test]
    fn test_empty() {
        assert!(WeightedRoundRobin::new().select(&[]).is_none());
        assert!(WeightedRandom::new().select(&[]).is_none());
    }
}

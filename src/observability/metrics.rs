//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count calls, cache lookups, retries, and breaker rejections per client
//! - Count endpoint selections
//! - Mirror every count to the `metrics` facade for Prometheus
//!
//! # Metrics
//! - `client_requests_total` (counter): logical calls by outcome
//! - `client_request_duration_seconds` (histogram): logical call latency
//! - `client_retries_total` (counter): retries scheduled
//! - `client_circuit_rejections_total` (counter): calls failed fast by the breaker
//! - `client_cache_lookups_total` (counter): cache lookups by result
//! - `client_endpoint_selections_total` (counter): selections by endpoint
//! - `client_endpoint_health` (gauge): 1 healthy, 0.5 degraded, 0 unhealthy
//! - `client_circuit_opened_total` (counter): breaker transitions to open
//! - `client_rate_limited_total` (counter): calls delayed by the rate limiter
//!
//! # Design Decisions
//! - The registry is an explicit object owned by the client, not global state
//! - Facade emission is a no-op until a recorder is installed

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

use crate::load_balancer::EndpointSnapshot;
use crate::resilience::CircuitState;

/// Install the Prometheus exporter on `addr`. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Per-client counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    total: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    retries: AtomicU64,
    circuit_rejections: AtomicU64,
    selections: DashMap<String, u64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One finished logical call.
    pub fn record_call(&self, success: bool, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let outcome = if success {
            self.success.fetch_add(1, Ordering::Relaxed);
            "success"
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
            "failure"
        };
        metrics::counter!("client_requests_total", "outcome" => outcome).increment(1);
        metrics::histogram!("client_request_duration_seconds").record(elapsed.as_secs_f64());
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            "hit"
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
            "miss"
        };
        metrics::counter!("client_cache_lookups_total", "result" => result).increment(1);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("client_retries_total").increment(1);
    }

    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("client_circuit_rejections_total").increment(1);
    }

    pub fn record_selection(&self, endpoint: &str) {
        *self.selections.entry(endpoint.to_string()).or_insert(0) += 1;
        metrics::counter!("client_endpoint_selections_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// Drop the selection count of a deregistered endpoint.
    pub fn forget_endpoint(&self, endpoint: &str) {
        self.selections.remove(endpoint);
    }

    pub fn selections(&self, endpoint: &str) -> u64 {
        self.selections.get(endpoint).map(|count| *count).unwrap_or(0)
    }

    /// Combine counters with the current endpoint and breaker views.
    pub fn snapshot(
        &self,
        endpoints: Vec<EndpointSnapshot>,
        circuit_breaker_state: Option<CircuitState>,
    ) -> ClientMetrics {
        let total = self.total.load(Ordering::Relaxed);
        let success = self.success.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;

        ClientMetrics {
            total_requests: total,
            successful_requests: success,
            failed_requests: self.failure.load(Ordering::Relaxed),
            success_rate: ratio(success, total),
            cache_hits,
            cache_misses,
            cache_hit_rate: ratio(cache_hits, lookups),
            retries: self.retries.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            circuit_breaker_state,
            endpoints: endpoints
                .into_iter()
                .map(|stats| EndpointMetrics {
                    selections: self.selections(&stats.url),
                    stats,
                })
                .collect(),
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Serializable view returned by `ServiceClient::get_metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub retries: u64,
    pub circuit_rejections: u64,
    /// `None` when the client runs without a breaker.
    pub circuit_breaker_state: Option<CircuitState>,
    pub endpoints: Vec<EndpointMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointMetrics {
    pub selections: u64,
    #[serde(flatten)]
    pub stats: EndpointSnapshot,
}

//! Service endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single candidate backend
//! - Track active connections (for Least Connections LB)
//! - Track request outcomes and response times (for Least Response Time LB)
//! - Track health state and the endpoint-level circuit

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use url::Url;

use crate::error::ClientError;
use crate::health::state::HealthState;

#[derive(Debug)]
struct EndpointStats {
    health: HealthState,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    /// Running mean over successful requests, in seconds.
    avg_response_time: f64,
    last_response_time: f64,
    consecutive_successes: u32,
    consecutive_failures: u32,
    circuit_open: bool,
    circuit_open_until: Option<Instant>,
}

/// A single backend the client may send requests to.
#[derive(Debug)]
pub struct ServiceEndpoint {
    url: Url,
    weight: f64,
    /// Requests currently in flight.
    active_connections: AtomicUsize,
    stats: Mutex<EndpointStats>,
}

impl ServiceEndpoint {
    /// Create a new endpoint. Endpoints start healthy.
    pub fn new(url: Url, weight: f64) -> Self {
        Self {
            url,
            weight,
            active_connections: AtomicUsize::new(0),
            stats: Mutex::new(EndpointStats {
                health: HealthState::Healthy,
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
                avg_response_time: 0.0,
                last_response_time: 0.0,
                consecutive_successes: 0,
                consecutive_failures: 0,
                circuit_open: false,
                circuit_open_until: None,
            }),
        }
    }

    /// Parse `url` and create an endpoint.
    pub fn parse(url: &str, weight: f64) -> Result<Self, ClientError> {
        let parsed = Url::parse(url).map_err(|e| ClientError::InvalidEndpoint {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !(weight > 0.0) {
            return Err(ClientError::InvalidEndpoint {
                url: url.to_string(),
                reason: format!("weight must be positive, got {}", weight),
            });
        }
        Ok(Self::new(parsed, weight))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Get the current number of in-flight requests.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Absolute URL for `path` on this endpoint, with `params` appended as query.
    pub fn request_url(&self, path: &str, params: &[(String, String)]) -> Result<Url, ClientError> {
        let base = self.url.as_str().trim_end_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path.trim_start_matches('/'))
        };
        let mut url = Url::parse(&joined)
            .map_err(|e| ClientError::InvalidRequest(format!("bad path '{}': {}", path, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    // --- Request accounting ---

    /// Count a request as started. The returned guard releases the
    /// connection slot if it is dropped before [`EndpointGuard::finish`].
    pub fn record_request_start(self: &Arc<Self>) -> EndpointGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.lock().total_requests += 1;
        EndpointGuard {
            endpoint: Arc::clone(self),
            finished: false,
        }
    }

    /// Occupy a connection slot without counting a request.
    pub fn occupy(self: &Arc<Self>) -> EndpointGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        EndpointGuard {
            endpoint: Arc::clone(self),
            finished: false,
        }
    }

    /// Count a request as finished.
    pub fn record_request_end(&self, success: bool, response_time: Duration) {
        self.release_connection();
        let elapsed = response_time.as_secs_f64();
        let mut stats = self.lock();
        stats.last_response_time = elapsed;
        if success {
            stats.successful_requests += 1;
            let n = stats.successful_requests as f64;
            stats.avg_response_time += (elapsed - stats.avg_response_time) / n;
            stats.consecutive_successes += 1;
            stats.consecutive_failures = 0;
        } else {
            stats.failed_requests += 1;
            stats.consecutive_failures += 1;
            stats.consecutive_successes = 0;
        }
    }

    fn release_connection(&self) {
        // Floor at zero.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_sub(1)));
    }

    // --- Health Logic ---

    pub fn health(&self) -> HealthState {
        self.lock().health
    }

    pub fn update_health(&self, health: HealthState) {
        self.lock().health = health;
    }

    /// Apply a probe result and return the consecutive failure count.
    ///
    /// Healthy resets the failure streak, Unhealthy extends it, Degraded
    /// leaves it untouched.
    pub fn record_probe(&self, health: HealthState) -> u32 {
        let mut stats = self.lock();
        stats.health = health;
        match health {
            HealthState::Healthy => stats.consecutive_failures = 0,
            HealthState::Unhealthy => stats.consecutive_failures += 1,
            HealthState::Degraded | HealthState::Unknown => {}
        }
        stats.consecutive_failures
    }

    /// Exclude this endpoint from selection for `timeout`.
    pub fn open_circuit(&self, timeout: Duration) {
        let mut stats = self.lock();
        stats.circuit_open = true;
        stats.circuit_open_until = Instant::now().checked_add(timeout);
    }

    /// Whether the endpoint can be selected right now.
    ///
    /// An expired endpoint circuit is cleared as part of the read.
    pub fn is_available(&self) -> bool {
        let mut stats = self.lock();
        if stats.circuit_open {
            let expired = stats
                .circuit_open_until
                .map(|until| Instant::now() >= until)
                .unwrap_or(false);
            if !expired {
                return false;
            }
            stats.circuit_open = false;
            stats.circuit_open_until = None;
        }
        stats.health.accepts_traffic()
    }

    pub fn is_circuit_open(&self) -> bool {
        self.lock().circuit_open
    }

    // --- Performance ---

    /// successful / total, 0 when nothing was sent yet.
    pub fn success_rate(&self) -> f64 {
        let stats = self.lock();
        if stats.total_requests == 0 {
            0.0
        } else {
            stats.successful_requests as f64 / stats.total_requests as f64
        }
    }

    pub fn average_response_time(&self) -> Duration {
        Duration::from_secs_f64(self.lock().avg_response_time.max(0.0))
    }

    /// True once at least one request has completed successfully.
    pub fn has_response_history(&self) -> bool {
        self.lock().successful_requests > 0
    }

    pub fn total_requests(&self) -> u64 {
        self.lock().total_requests
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.lock().consecutive_successes
    }

    /// Point-in-time view for metrics and the admin API.
    pub fn snapshot(&self) -> EndpointSnapshot {
        let available = self.is_available();
        let stats = self.lock();
        let success_rate = if stats.total_requests == 0 {
            0.0
        } else {
            stats.successful_requests as f64 / stats.total_requests as f64
        };
        EndpointSnapshot {
            url: self.url.to_string(),
            weight: self.weight,
            health: stats.health,
            available,
            active_connections: self.active_connections(),
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            success_rate,
            avg_response_time_ms: stats.avg_response_time * 1000.0,
            last_response_time_ms: stats.last_response_time * 1000.0,
            consecutive_successes: stats.consecutive_successes,
            consecutive_failures: stats.consecutive_failures,
            circuit_open: stats.circuit_open,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EndpointStats> {
        self.stats.lock().expect("endpoint stats mutex poisoned")
    }
}

/// Serializable endpoint statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub url: String,
    pub weight: f64,
    pub health: HealthState,
    pub available: bool,
    pub active_connections: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub last_response_time_ms: f64,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub circuit_open: bool,
}

/// Holds an active-connection slot on an endpoint for one attempt.
#[derive(Debug)]
pub struct EndpointGuard {
    endpoint: Arc<ServiceEndpoint>,
    finished: bool,
}

impl EndpointGuard {
    pub fn endpoint(&self) -> &Arc<ServiceEndpoint> {
        &self.endpoint
    }

    /// Record the attempt outcome and release the slot.
    pub fn finish(mut self, success: bool, response_time: Duration) {
        self.finished = true;
        self.endpoint.record_request_end(success, response_time);
    }

    /// Release the slot without touching the request counters.
    pub fn release(mut self) {
        self.finished = true;
        self.endpoint.release_connection();
    }
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.endpoint.release_connection();
            tracing::debug!(endpoint = %self.endpoint.url, "Attempt abandoned, connection slot released");
        }
    }
}

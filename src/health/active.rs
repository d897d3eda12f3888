//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered endpoint
//! - Update endpoint health and failure streaks from the results
//! - Open an endpoint's circuit once its failure streak reaches the threshold

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use axum::http::{header::USER_AGENT, HeaderValue, Method};
use futures_util::future::{join_all, FutureExt};
use tokio::sync::broadcast;

use crate::config::{secs, HealthCheckConfig};
use crate::health::state::HealthState;
use crate::http::request::OutboundRequest;
use crate::http::transport::Transport;
use crate::load_balancer::{LoadBalancer, ServiceEndpoint};

const PROBE_USER_AGENT: &str = "resilient-client-health-check";

/// Probes endpoints over a [`Transport`].
pub struct HealthMonitor {
    transport: Arc<dyn Transport>,
    config: HealthCheckConfig,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor").field("config", &self.config).finish()
    }
}

impl HealthMonitor {
    pub fn new(transport: Arc<dyn Transport>, config: HealthCheckConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Probe loop. Exits on shutdown or once the balancer is gone.
    pub async fn run(self: Arc<Self>, balancer: Weak<LoadBalancer>, mut shutdown: broadcast::Receiver<()>) {
        let interval = secs(self.config.interval_secs);
        let retry_pause = secs(self.config.retry_pause_secs);

        tracing::info!(
            interval = ?interval,
            path = %self.config.path,
            "Health monitor starting"
        );

        loop {
            let Some(lb) = balancer.upgrade() else {
                tracing::debug!("Load balancer dropped, health monitor exiting");
                break;
            };
            let endpoints = lb.endpoints();
            drop(lb);

            let round = AssertUnwindSafe(self.check_all(&endpoints)).catch_unwind();
            let pause = tokio::select! {
                result = round => match result {
                    Ok(_) => interval,
                    Err(_) => {
                        tracing::error!(pause = ?retry_pause, "Health check round panicked, retrying after pause");
                        retry_pause
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, abandoning round");
                    break;
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe all `endpoints` concurrently. One probe panicking or hanging
    /// never affects the others.
    pub async fn check_all(&self, endpoints: &[Arc<ServiceEndpoint>]) -> Vec<HealthState> {
        let probes = endpoints.iter().map(|endpoint| async move {
            match AssertUnwindSafe(self.check(endpoint)).catch_unwind().await {
                Ok(state) => state,
                Err(_) => {
                    tracing::error!(endpoint = %endpoint.url(), "Health probe panicked");
                    HealthState::Unknown
                }
            }
        });
        join_all(probes).await
    }

    /// Probe one endpoint and apply the result.
    pub async fn check(&self, endpoint: &ServiceEndpoint) -> HealthState {
        let state = self.probe(endpoint).await;
        let failures = endpoint.record_probe(state);

        metrics::gauge!("client_endpoint_health", "endpoint" => endpoint.url().to_string())
            .set(health_gauge(state));

        if state == HealthState::Unhealthy {
            tracing::warn!(
                endpoint = %endpoint.url(),
                consecutive_failures = failures,
                "Endpoint marked unhealthy"
            );
            if failures >= self.config.failure_threshold {
                let timeout = secs(self.config.circuit_timeout_secs);
                endpoint.open_circuit(timeout);
                tracing::warn!(
                    endpoint = %endpoint.url(),
                    consecutive_failures = failures,
                    open_for = ?timeout,
                    "Endpoint circuit opened"
                );
            }
        }
        state
    }

    async fn probe(&self, endpoint: &ServiceEndpoint) -> HealthState {
        let url = match endpoint.request_url(&self.config.path, &[]) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(endpoint = %endpoint.url(), error = %e, "Failed to build health check url");
                return HealthState::Unhealthy;
            }
        };
        let mut request = OutboundRequest::new(Method::GET, url);
        request
            .headers
            .insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));

        let timeout = secs(self.config.timeout_secs);
        match self.transport.send(request, timeout).await {
            Ok(response) => {
                let state = HealthState::from_probe_status(response.status.as_u16());
                if state != HealthState::Healthy {
                    tracing::debug!(endpoint = %endpoint.url(), status = %response.status, "Health check non-success status");
                }
                state
            }
            Err(e) => {
                tracing::debug!(endpoint = %endpoint.url(), error = %e, "Health check failed");
                HealthState::Unhealthy
            }
        }
    }
}

fn health_gauge(state: HealthState) -> f64 {
    match state {
        HealthState::Healthy => 1.0,
        HealthState::Degraded => 0.5,
        HealthState::Unhealthy | HealthState::Unknown => 0.0,
    }
}

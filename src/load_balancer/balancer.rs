//! Endpoint registry and selection.
//!
//! # Responsibilities
//! - Own the set of registered endpoints
//! - Filter to available endpoints and apply the strategy
//! - Own the background health-check task

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use url::Url;

use crate::config::HealthCheckConfig;
use crate::error::ClientError;
use crate::health::HealthMonitor;
use crate::http::transport::Transport;
use crate::lifecycle::BackgroundTask;
use crate::load_balancer::{ServiceEndpoint, Selector, Strategy};

type Registry = Vec<Arc<ServiceEndpoint>>;

/// Registry of endpoints plus one selection strategy.
///
/// Selection works on a snapshot of the registry, so concurrent add/remove
/// never disturbs a selection in progress.
#[derive(Debug)]
pub struct LoadBalancer {
    strategy: Strategy,
    selector: Box<dyn Selector>,
    endpoints: ArcSwap<Registry>,
    health_task: Mutex<Option<BackgroundTask>>,
}

impl LoadBalancer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            selector: strategy.selector(),
            endpoints: ArcSwap::from_pointee(Vec::new()),
            health_task: Mutex::new(None),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Register `url`. Registering a URL twice returns the existing endpoint.
    pub fn add_endpoint(&self, url: &str, weight: f64) -> Result<Arc<ServiceEndpoint>, ClientError> {
        let candidate = Arc::new(ServiceEndpoint::parse(url, weight)?);
        let mut registered = Arc::clone(&candidate);
        self.endpoints.rcu(|current| {
            if let Some(existing) = current.iter().find(|ep| ep.url() == candidate.url()) {
                registered = Arc::clone(existing);
                return Arc::clone(current);
            }
            registered = Arc::clone(&candidate);
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&candidate));
            Arc::new(next)
        });

        if Arc::ptr_eq(&registered, &candidate) {
            tracing::info!(endpoint = %registered.url(), weight, "Endpoint added");
        } else {
            tracing::debug!(endpoint = %registered.url(), "Endpoint already registered");
        }
        Ok(registered)
    }

    /// Deregister `url`. Returns whether it was registered.
    pub fn remove_endpoint(&self, url: &str) -> bool {
        let Ok(target) = Url::parse(url) else {
            return false;
        };
        let mut removed = false;
        self.endpoints.rcu(|current| {
            let next: Registry = current
                .iter()
                .filter(|ep| *ep.url() != target)
                .cloned()
                .collect();
            removed = next.len() != current.len();
            Arc::new(next)
        });
        if removed {
            self.selector.forget(target.as_str());
            tracing::info!(endpoint = %target, "Endpoint removed");
        }
        removed
    }

    /// Snapshot of every registered endpoint, in registration order.
    pub fn endpoints(&self) -> Registry {
        self.endpoints.load().as_ref().clone()
    }

    pub fn endpoint(&self, url: &str) -> Option<Arc<ServiceEndpoint>> {
        let target = Url::parse(url).ok()?;
        self.endpoints.load().iter().find(|ep| *ep.url() == target).cloned()
    }

    pub fn len(&self) -> usize {
        self.endpoints.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Endpoints that may receive traffic right now.
    pub fn get_healthy_endpoints(&self) -> Registry {
        self.endpoints
            .load()
            .iter()
            .filter(|ep| ep.is_available())
            .cloned()
            .collect()
    }

    /// Pick an endpoint for the next attempt.
    pub fn select_endpoint(&self) -> Result<Arc<ServiceEndpoint>, ClientError> {
        let healthy = self.get_healthy_endpoints();
        if healthy.is_empty() {
            tracing::warn!(registered = self.len(), "No healthy endpoints");
            return Err(ClientError::NoHealthyEndpoints);
        }
        self.selector
            .select(&healthy)
            .ok_or(ClientError::NoHealthyEndpoints)
    }

    /// Run one probe round over every registered endpoint.
    pub async fn check_all(&self, monitor: &HealthMonitor) {
        let endpoints = self.endpoints();
        monitor.check_all(&endpoints).await;
    }

    // --- Background health checks ---

    /// Start the probe loop. Does nothing when disabled or already running.
    pub fn start_health_checks(self: &Arc<Self>, transport: Arc<dyn Transport>, config: HealthCheckConfig) {
        if !config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }
        let mut slot = self.health_task.lock().expect("health task mutex poisoned");
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let monitor = Arc::new(HealthMonitor::new(transport, config));
        let balancer = Arc::downgrade(self);
        *slot = Some(BackgroundTask::spawn("health-monitor", move |shutdown| {
            monitor.run(balancer, shutdown)
        }));
    }

    /// Stop the probe loop and wait for it to exit.
    pub async fn stop_health_checks(&self) {
        let task = self.health_task.lock().expect("health task mutex poisoned").take();
        if let Some(task) = task {
            task.stop().await;
        }
    }

    /// Signal the probe loop to stop without waiting for it.
    pub fn cancel_health_checks(&self) {
        let task = self.health_task.lock().expect("health task mutex poisoned").take();
        drop(task);
    }

    pub fn health_checks_running(&self) -> bool {
        self.health_task
            .lock()
            .expect("health task mutex poisoned")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

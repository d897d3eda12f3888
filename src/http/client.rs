//! Service client facade.
//!
//! # Responsibilities
//! - Assemble the executor and its components from `ClientConfig`
//! - Expose calls, endpoint management, metrics, and health to callers
//! - Own the connect/disconnect lifecycle of the background health loop

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use url::Url;

use crate::cache::ResponseCache;
use crate::config::{secs, validate_config, ClientConfig};
use crate::error::{ClientError, ClientResult};
use crate::health::HealthState;
use crate::http::executor::RequestExecutor;
use crate::http::interceptors::{
    DefaultHeaders, RequestIdInterceptor, RequestInterceptor, ResponseInterceptor,
};
use crate::http::request::RequestSpec;
use crate::http::response::Response;
use crate::http::transport::{HyperTransport, Transport};
use crate::load_balancer::{EndpointSnapshot, LoadBalancer, ServiceEndpoint};
use crate::net::{ConnectionPoolSizer, PoolRecommendation};
use crate::observability::{ClientMetrics, MetricsRegistry};
use crate::resilience::{CircuitBreaker, CircuitState, RetryPolicy};
use crate::security::{BearerAuth, RateLimiter};

/// Result of [`ServiceClient::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub response_time_ms: f64,
    pub circuit_breaker_state: Option<CircuitState>,
    /// Endpoint that answered, when one did.
    pub endpoint: Option<String>,
    pub error: Option<String>,
}

/// Builder for [`ServiceClient`].
pub struct ServiceClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    retry_policy: Option<RetryPolicy>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl ServiceClientBuilder {
    /// Replace the default hyper transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the policy built from the `[retries]` section.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Runs after the built-in interceptors, in registration order.
    pub fn request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.request_interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn response_interceptor(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        self.response_interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> ClientResult<ServiceClient> {
        let config = self.config;
        validate_config(&config).map_err(|errors| {
            let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ClientError::InvalidConfig(joined.join("; "))
        })?;

        let balancer = Arc::new(LoadBalancer::new(config.load_balancer.strategy));
        for endpoint in &config.endpoints {
            balancer.add_endpoint(&endpoint.url, endpoint.weight)?;
        }

        let pool = ConnectionPoolSizer::recommend_for(&config.pool);
        let (transport, health_transport): (Arc<dyn Transport>, Arc<dyn Transport>) =
            match self.transport {
                Some(transport) => (Arc::clone(&transport), transport),
                None => {
                    let hyper = HyperTransport::new(&config.timeouts, pool);
                    let probes = hyper.for_health_checks();
                    (Arc::new(hyper), Arc::new(probes))
                }
            };
        let retry_policy = self
            .retry_policy
            .unwrap_or_else(|| RetryPolicy::from_config(&config.retries));

        let mut executor = RequestExecutor::new(Arc::clone(&balancer), transport)
            .with_retry_policy(retry_policy)
            .with_metrics(Arc::new(MetricsRegistry::new()))
            .with_default_timeout(secs(config.timeouts.request_secs))
            .with_request_interceptor(Arc::new(RequestIdInterceptor));

        if config.circuit_breaker.enabled {
            executor = executor.with_breaker(Arc::new(CircuitBreaker::from_config(
                "client",
                &config.circuit_breaker,
            )));
        }
        if let Some(limiter) = RateLimiter::from_config(&config.rate_limit) {
            executor = executor.with_rate_limiter(Arc::new(limiter));
        }
        if let Some(cache) = ResponseCache::from_config(&config.cache) {
            executor = executor.with_cache(Arc::new(cache));
        }

        let defaults = DefaultHeaders::from_map(&config.headers)?;
        if !defaults.is_empty() {
            executor = executor.with_request_interceptor(Arc::new(defaults));
        }
        if let Some(token) = &config.auth.bearer_token {
            executor = executor.with_request_interceptor(Arc::new(BearerAuth::new(token)?));
        }
        for interceptor in self.request_interceptors {
            executor = executor.with_request_interceptor(interceptor);
        }
        for interceptor in self.response_interceptors {
            executor = executor.with_response_interceptor(interceptor);
        }

        tracing::info!(
            endpoints = balancer.len(),
            strategy = %balancer.strategy(),
            max_attempts = executor.retry_policy().max_attempts(),
            circuit_breaker = config.circuit_breaker.enabled,
            rate_limit = config.rate_limit.enabled,
            cache = config.cache.enabled,
            "Service client created"
        );

        Ok(ServiceClient {
            config,
            executor,
            health_transport,
            pool,
            connected: AtomicBool::new(false),
        })
    }
}

/// Resilient client for one logical service behind several endpoints.
pub struct ServiceClient {
    config: ClientConfig,
    executor: RequestExecutor,
    /// Used by the background health loop; bypasses the in-flight bound.
    health_transport: Arc<dyn Transport>,
    pool: PoolRecommendation,
    connected: AtomicBool,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("executor", &self.executor)
            .field("pool", &self.pool)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ServiceClient {
    pub fn builder(config: ClientConfig) -> ServiceClientBuilder {
        ServiceClientBuilder {
            config,
            transport: None,
            retry_policy: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        self.executor.balancer()
    }

    pub fn pool_recommendation(&self) -> PoolRecommendation {
        self.pool
    }

    // --- Calls ---

    pub async fn execute(&self, spec: RequestSpec) -> ClientResult<Response> {
        self.executor.execute(spec).await
    }

    pub async fn get(&self, path: &str) -> ClientResult<Response> {
        self.execute(RequestSpec::get(path)).await
    }

    pub async fn post(&self, path: &str, body: impl Into<axum::body::Bytes>) -> ClientResult<Response> {
        self.execute(RequestSpec::post(path).body(body)).await
    }

    pub async fn put(&self, path: &str, body: impl Into<axum::body::Bytes>) -> ClientResult<Response> {
        self.execute(RequestSpec::put(path).body(body)).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<Response> {
        self.execute(RequestSpec::delete(path)).await
    }

    // --- Endpoints ---

    pub fn add_endpoint(&self, url: &str, weight: f64) -> ClientResult<Arc<ServiceEndpoint>> {
        self.balancer().add_endpoint(url, weight)
    }

    pub fn remove_endpoint(&self, url: &str) -> bool {
        let removed = self.balancer().remove_endpoint(url);
        if removed {
            if let Ok(parsed) = Url::parse(url) {
                self.executor.metrics().forget_endpoint(parsed.as_str());
            }
        }
        removed
    }

    pub fn endpoints(&self) -> Vec<EndpointSnapshot> {
        self.balancer().endpoints().iter().map(|ep| ep.snapshot()).collect()
    }

    // --- Status ---

    pub fn get_metrics(&self) -> ClientMetrics {
        let breaker = self.executor.breaker().map(|b| b.state());
        self.executor.metrics().snapshot(self.endpoints(), breaker)
    }

    /// Send one health request, bypassing the breaker and the cache.
    /// Neither client metrics nor endpoint statistics see it, and it is
    /// never retried.
    pub async fn health_check(&self) -> HealthReport {
        let health = &self.config.load_balancer.health_check;
        let spec = RequestSpec::get(health.path.clone())
            .bypass_breaker()
            .cache(false)
            .timeout(secs(health.timeout_secs));

        let started = Instant::now();
        let result = self.executor.execute_untracked(spec).await;
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let circuit_breaker_state = self.executor.breaker().map(|b| b.state());

        match result {
            Ok(response) => HealthReport {
                status: HealthState::Healthy,
                response_time_ms,
                circuit_breaker_state,
                endpoint: Some(response.endpoint),
                error: None,
            },
            Err(e) => HealthReport {
                status: match e.status() {
                    Some(status) => HealthState::from_probe_status(status),
                    None => HealthState::Unhealthy,
                },
                response_time_ms,
                circuit_breaker_state,
                endpoint: e.endpoint().map(str::to_string),
                error: Some(e.to_string()),
            },
        }
    }

    // --- Lifecycle ---

    /// Start background health checks.
    pub fn connect(&self) {
        if self.connected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.balancer().start_health_checks(
            Arc::clone(&self.health_transport),
            self.config.load_balancer.health_check.clone(),
        );
        tracing::info!("Service client connected");
    }

    /// Stop background health checks and wait for them to finish.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.balancer().stop_health_checks().await;
        tracing::info!("Service client disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect, run `f`, disconnect. The health loop is signalled to stop on
    /// every exit path, including a panic in `f` or dropping this future.
    pub async fn run<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a ServiceClient) -> Fut,
        Fut: Future<Output = T>,
    {
        self.connect();
        let guard = DisconnectGuard { client: self, armed: true };
        let output = f(self).await;
        guard.disarm();
        self.disconnect().await;
        output
    }
}

/// Signals the health loop if a scoped `run` exits abnormally.
struct DisconnectGuard<'a> {
    client: &'a ServiceClient,
    armed: bool,
}

impl DisconnectGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.client.connected.store(false, Ordering::SeqCst);
            self.client.balancer().cancel_health_checks();
            tracing::warn!("Scoped client run aborted, health checks signalled to stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::EndpointConfig;
    use crate::http::request::OutboundRequest;
    use crate::http::transport::tests::{Reply, ScriptedTransport};

    const A: &str = "http://127.0.0.1:9000";
    const B: &str = "http://127.0.0.1:9001";

    fn config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.endpoints = vec![
            EndpointConfig { url: A.to_string(), weight: 1.0 },
            EndpointConfig { url: B.to_string(), weight: 1.0 },
        ];
        config.retries.jitter = false;
        config.retries.base_delay_secs = 0.1;
        config
    }

    fn client(transport: Arc<ScriptedTransport>, config: ClientConfig) -> ServiceClient {
        ServiceClient::builder(config).transport(transport).build().unwrap()
    }

    #[tokio::test]
    async fn test_builder_wires_interceptors() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut config = config();
        config.headers.insert("user-agent".into(), "svc/1.0".into());
        config.auth.bearer_token = Some("t0k".into());

        let client = ServiceClient::builder(config)
            .transport(transport.clone())
            .request_interceptor(|req: &mut OutboundRequest| {
                req.headers.insert("x-custom", axum::http::HeaderValue::from_static("1"));
            })
            .build()
            .unwrap();

        client.get("/ping").await.unwrap();
        let sent = transport.sent.lock().unwrap();
        let headers = &sent[0].headers;
        assert!(headers.contains_key("x-request-id"));
        assert_eq!(headers["user-agent"], "svc/1.0");
        assert_eq!(headers["authorization"], "Bearer t0k");
        assert_eq!(headers["x-custom"], "1");
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = config();
        config.retries.max_attempts = 0;
        let err = ServiceClient::builder(config)
            .transport(Arc::new(ScriptedTransport::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_endpoint_management_and_metrics() {
        let client = client(Arc::new(ScriptedTransport::new()), config());
        assert_eq!(client.endpoints().len(), 2);

        client.add_endpoint("http://127.0.0.1:9002", 2.0).unwrap();
        assert!(client.remove_endpoint(A));
        let urls: Vec<String> = client.endpoints().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["http://127.0.0.1:9001/", "http://127.0.0.1:9002/"]);

        client.get("/a").await.unwrap();
        client.post("/b", "payload").await.unwrap();
        let metrics = client.get_metrics();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.success_rate, 1.0);
        assert_eq!(metrics.circuit_breaker_state, Some(CircuitState::Closed));
        assert_eq!(metrics.endpoints.len(), 2);
        let selected: u64 = metrics.endpoints.iter().map(|e| e.selections).sum();
        assert_eq!(selected, 2);

        // A re-added endpoint does not inherit its old selection count.
        let c = "http://127.0.0.1:9002/";
        let before = client.executor().metrics().selections(c);
        assert!(client.remove_endpoint(c));
        client.add_endpoint(c, 2.0).unwrap();
        assert!(before > 0);
        assert_eq!(client.executor().metrics().selections(c), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_report() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(A, [Reply::Status(404)])
                .script(B, std::iter::repeat(Reply::Status(500)).take(10)),
        );
        let mut config = config();
        config.endpoints.truncate(1);
        config.retries.max_attempts = 1;
        let client = client(transport.clone(), config);

        let report = client.health_check().await;
        assert_eq!(report.status, HealthState::Degraded);
        assert_eq!(transport.sent_urls(), vec!["http://127.0.0.1:9000/health".to_string()]);

        let report = client.health_check().await;
        assert_eq!(report.status, HealthState::Healthy);
        assert_eq!(report.endpoint.as_deref(), Some("http://127.0.0.1:9000/"));
        assert_eq!(report.circuit_breaker_state, Some(CircuitState::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_is_single_untracked_attempt() {
        let transport = Arc::new(ScriptedTransport::new().script(A, std::iter::repeat(Reply::Status(500)).take(10)));
        let mut config = config();
        config.endpoints.truncate(1);
        let client = client(transport.clone(), config);

        let report = client.health_check().await;
        assert_eq!(report.status, HealthState::Unhealthy);
        assert_eq!(transport.sent_count(), 1);

        let metrics = client.get_metrics();
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.retries, 0);
        assert_eq!(client.executor().metrics().selections(&format!("{}/", A)), 0);
        let endpoint = &client.endpoints()[0];
        assert_eq!(endpoint.total_requests, 0);
        assert_eq!(endpoint.failed_requests, 0);
        assert_eq!(endpoint.active_connections, 0);

        // The same failure through the normal path is retried and counted.
        assert!(client.get("/x").await.is_err());
        assert_eq!(transport.sent_count(), 4);
        assert_eq!(client.get_metrics().total_requests, 1);
        assert_eq!(client.endpoints()[0].total_requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_bypasses_open_breaker() {
        let transport = Arc::new(ScriptedTransport::new().script(A, std::iter::repeat(Reply::Status(500)).take(10)));
        let mut config = config();
        config.endpoints.truncate(1);
        config.retries.max_attempts = 1;
        config.circuit_breaker.failure_threshold = 1;
        let client = client(transport.clone(), config);

        assert!(client.get("/x").await.is_err());
        assert!(matches!(client.get("/x").await, Err(ClientError::CircuitOpen)));

        let report = client.health_check().await;
        assert_eq!(report.status, HealthState::Unhealthy);
        assert_eq!(report.circuit_breaker_state, Some(CircuitState::Open));
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_disconnect() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(transport.clone(), config());
        assert!(!client.is_connected());

        client.connect();
        client.connect();
        assert!(client.is_connected());
        assert!(client.balancer().health_checks_running());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.sent_count(), 2);

        client.disconnect().await;
        assert!(!client.is_connected());
        assert!(!client.balancer().health_checks_running());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_run() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(transport, config());

        let status = client
            .run(|c| async move {
                assert!(c.is_connected());
                c.get("/inside").await.map(|r| r.status.as_u16())
            })
            .await
            .unwrap();
        assert_eq!(status, 200);
        assert!(!client.is_connected());
        assert!(!client.balancer().health_checks_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_run_cancelled() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(transport.clone(), config());

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            client.run(|_| std::future::pending::<()>()),
        )
        .await;
        assert!(outcome.is_err());
        assert!(!client.is_connected());

        let probes = transport.sent_count();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.sent_count(), probes);
    }
}

//! Request orchestration.
//!
//! # Responsibilities
//! - Compose rate limiting, caching, circuit breaking, selection, retries
//! - Keep endpoint and breaker bookkeeping in step with every attempt
//! - Surface the last concrete failure when the call gives up
//!
//! # Design Decisions
//! - Attempts of one call are strictly sequential
//! - The breaker is consulted once per call, before the first attempt
//! - The endpoint slot is held by a guard, so cancellation releases it

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::error::{ClientError, ClientResult};
use crate::http::interceptors::{RequestInterceptor, ResponseInterceptor};
use crate::http::request::{OutboundRequest, RequestSpec};
use crate::http::response::Response;
use crate::http::transport::Transport;
use crate::load_balancer::LoadBalancer;
use crate::observability::MetricsRegistry;
use crate::resilience::timeouts::{effective_timeout, with_deadline};
use crate::resilience::{CircuitBreaker, Outcome, RetryAttempt, RetryPolicy};
use crate::security::RateLimiter;

/// Default per-attempt timeout when neither config nor request sets one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs logical calls against a [`LoadBalancer`].
pub struct RequestExecutor {
    balancer: Arc<LoadBalancer>,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    breaker: Option<Arc<CircuitBreaker>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    cache: Option<Arc<ResponseCache>>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    metrics: Arc<MetricsRegistry>,
    default_timeout: Duration,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("strategy", &self.balancer.strategy())
            .field("retry_policy", &self.retry_policy)
            .field("breaker", &self.breaker)
            .field("rate_limited", &self.rate_limiter.is_some())
            .field("cached", &self.cache.is_some())
            .field("request_interceptors", &self.request_interceptors.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl RequestExecutor {
    pub fn new(balancer: Arc<LoadBalancer>, transport: Arc<dyn Transport>) -> Self {
        Self {
            balancer,
            transport,
            retry_policy: RetryPolicy::default(),
            breaker: None,
            rate_limiter: None,
            cache: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            metrics: Arc::new(MetricsRegistry::new()),
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    pub fn with_response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run one logical call.
    pub async fn execute(&self, spec: RequestSpec) -> ClientResult<Response> {
        let started = Instant::now();
        let result = with_deadline(spec.deadline, self.run(&spec, &self.retry_policy, true, started)).await;
        self.metrics.record_call(result.is_ok(), started.elapsed());
        if let Err(e) = &result {
            tracing::debug!(method = %spec.method, path = %spec.path, error = %e, "Request failed");
        }
        result
    }

    /// Single attempt that leaves client metrics and endpoint statistics
    /// untouched. Used for on-demand health checks.
    pub async fn execute_untracked(&self, spec: RequestSpec) -> ClientResult<Response> {
        let policy = RetryPolicy::no_retry();
        with_deadline(spec.deadline, self.run(&spec, &policy, false, Instant::now())).await
    }

    async fn run(
        &self,
        spec: &RequestSpec,
        policy: &RetryPolicy,
        tracked: bool,
        started: Instant,
    ) -> ClientResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let cache = self
            .cache
            .as_ref()
            .filter(|_| spec.method == axum::http::Method::GET && spec.cache.unwrap_or(true));
        let cache_key = cache.map(|_| spec.cache_key());
        if let (Some(cache), Some(key)) = (cache, cache_key.as_deref()) {
            match cache.get(&spec.method, key) {
                Some(hit) => {
                    if tracked {
                        self.metrics.record_cache_lookup(true);
                    }
                    tracing::debug!(key = %key, age = ?hit.age(), "Cache hit");
                    let mut response = hit.response;
                    response.from_cache = true;
                    response.elapsed = started.elapsed();
                    return Ok(response);
                }
                None if tracked => self.metrics.record_cache_lookup(false),
                None => {}
            }
        }

        let breaker = self.breaker.as_ref().filter(|_| !spec.bypass_breaker);
        if let Some(breaker) = breaker {
            if !breaker.allows_requests() {
                if tracked {
                    self.metrics.record_circuit_rejection();
                }
                tracing::warn!(breaker = %breaker.name(), method = %spec.method, path = %spec.path, "Circuit open, failing fast");
                return Err(ClientError::CircuitOpen);
            }
        }

        let headers = spec.header_map()?;
        let timeout = effective_timeout(spec.timeout, self.default_timeout);
        let max_attempts = policy.max_attempts();
        let request_id = Uuid::new_v4();
        let mut history: Vec<RetryAttempt> = Vec::new();
        let mut last_error: Option<ClientError> = None;

        for attempt in 1..=max_attempts {
            let endpoint = match self.balancer.select_endpoint() {
                Ok(endpoint) => endpoint,
                Err(e) => return Err(last_error.unwrap_or(e)),
            };
            let endpoint_url = endpoint.url().to_string();
            if tracked {
                self.metrics.record_selection(&endpoint_url);
            }

            let mut request = OutboundRequest {
                request_id,
                attempt,
                method: spec.method.clone(),
                url: endpoint.request_url(&spec.path, &spec.params)?,
                headers: headers.clone(),
                body: spec.body.clone().unwrap_or_default(),
            };

            let guard = if tracked {
                endpoint.record_request_start()
            } else {
                endpoint.occupy()
            };
            for interceptor in &self.request_interceptors {
                interceptor.process_request(&mut request);
            }

            let mut record = RetryAttempt::new(attempt, &endpoint_url);
            tracing::debug!(
                request_id = %request_id,
                attempt,
                method = %request.method,
                url = %request.url,
                "Request sent"
            );

            let sent_at = Instant::now();
            let result = self.transport.send(request, timeout).await;
            let elapsed = sent_at.elapsed();
            record.elapsed = elapsed;

            let outcome = match result {
                Ok(mut response) => {
                    for interceptor in &self.response_interceptors {
                        interceptor.process_response(&mut response);
                    }
                    let status = response.status.as_u16();
                    record.status = Some(status);
                    tracing::debug!(
                        request_id = %request_id,
                        attempt,
                        endpoint = %endpoint_url,
                        status,
                        elapsed = ?elapsed,
                        "Response received"
                    );

                    if response.is_success() {
                        if tracked {
                            guard.finish(true, elapsed);
                        } else {
                            guard.release();
                        }
                        if let Some(breaker) = breaker {
                            breaker.record_success();
                        }
                        history.push(record);
                        response.endpoint = endpoint_url;
                        response.elapsed = started.elapsed();
                        response.attempts = history;
                        if let (Some(cache), Some(key)) = (cache, cache_key.as_deref()) {
                            cache.set(&spec.method, key, response.clone());
                        }
                        return Ok(response);
                    }

                    if tracked {
                        guard.finish(false, elapsed);
                    } else {
                        guard.release();
                    }
                    if let Some(breaker) = breaker {
                        breaker.record_failure();
                    }
                    last_error = Some(ClientError::Status {
                        status,
                        endpoint: endpoint_url,
                        attempts: attempt,
                        body: response.body,
                    });
                    Outcome::Status(status)
                }
                Err(err) => {
                    if tracked {
                        guard.finish(false, elapsed);
                    } else {
                        guard.release();
                    }
                    if let Some(breaker) = breaker {
                        breaker.record_failure();
                    }
                    tracing::warn!(
                        request_id = %request_id,
                        attempt,
                        endpoint = %endpoint_url,
                        error = %err,
                        "Attempt failed"
                    );
                    record.error = Some(err.to_string());
                    let outcome = Outcome::from(&err);
                    last_error = Some(ClientError::Transport {
                        endpoint: endpoint_url,
                        attempts: attempt,
                        source: err,
                    });
                    outcome
                }
            };

            if !policy.should_retry(attempt, outcome) {
                history.push(record);
                break;
            }

            let delay = policy.calculate_delay(attempt);
            record.delay = delay;
            history.push(record);
            if tracked {
                self.metrics.record_retry();
            }
            tracing::info!(
                request_id = %request_id,
                attempt,
                outcome = ?outcome,
                delay = ?delay,
                "Retry scheduled"
            );
            tokio::time::sleep(delay).await;
        }

        Err(last_error.unwrap_or(ClientError::RetriesExhausted {
            attempts: max_attempts,
        }))
    }
}

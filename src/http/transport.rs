//! HTTP transport primitive.
//!
//! # Responsibilities
//! - Send one request with a per-call timeout
//! - Buffer the response body up to a size limit
//! - Map client failures onto connect / timeout / network categories
//!
//! # Design Decisions
//! - The executor depends on the `Transport` trait only, so tests can script
//!   responses without sockets
//! - The timeout covers permit wait, send, and body read
//! - Health probes share the connection pool but never wait for a permit

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tokio::sync::Semaphore;

use crate::config::{secs, TimeoutConfig};
use crate::error::TransportError;
use crate::http::request::OutboundRequest;
use crate::http::response::Response;
use crate::net::PoolRecommendation;

/// Default cap on buffered response bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Sends a single request. Implementations must be cheap to share.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: OutboundRequest,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Response, TransportError>>;
}

/// Pooled hyper client.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    /// Bounds in-flight sends to the recommended connection count.
    /// `None` for the health-check view.
    permits: Option<Arc<Semaphore>>,
    max_body_bytes: usize,
}

impl HyperTransport {
    pub fn new(timeouts: &TimeoutConfig, pool: PoolRecommendation) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .pool_max_idle_per_host(pool.max_keepalive_connections)
            .build(connector);

        tracing::debug!(
            max_connections = pool.max_connections,
            max_keepalive = pool.max_keepalive_connections,
            "HTTP transport created"
        );

        Self {
            client,
            permits: Some(Arc::new(Semaphore::new(pool.max_connections.max(1)))),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Same client and connection pool, without the in-flight bound, so
    /// probes are never queued behind foreground calls.
    pub fn for_health_checks(&self) -> Self {
        Self {
            client: self.client.clone(),
            permits: None,
            max_body_bytes: self.max_body_bytes,
        }
    }

    async fn exchange(&self, request: OutboundRequest) -> Result<Response, TransportError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .acquire()
                    .await
                    .map_err(|_| TransportError::Network("transport closed".to_string()))?,
            ),
            None => None,
        };

        let mut builder = Request::builder()
            .method(request.method)
            .uri(request.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }
        let req = builder
            .body(Body::from(request.body))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = self.client.request(req).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(|e| TransportError::Network(format!("reading body: {}", e)))?;

        Ok(Response::new(parts.status, parts.headers, bytes))
    }
}

impl Transport for HyperTransport {
    fn send(
        &self,
        request: OutboundRequest,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, self.exchange(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            }
        })
    }
}

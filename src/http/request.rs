//! Request model.
//!
//! # Responsibilities
//! - Describe one logical call (`RequestSpec`), independent of endpoint
//! - Describe one concrete attempt (`OutboundRequest`) that interceptors mutate
//! - Derive the cache key for idempotent lookups
//!
//! # Design Decisions
//! - Header names/values are validated once per call, before any attempt
//! - One request ID per logical call, shared by all its attempts

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::error::ClientError;

/// Header carrying the per-call request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Everything the caller specifies about one logical call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the selected endpoint's base URL.
    pub path: String,
    /// Query parameters, appended in order.
    pub params: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub headers: Vec<(String, String)>,
    /// Per-attempt timeout override.
    pub timeout: Option<Duration>,
    /// Per-call cache override. `None` follows the client setting.
    pub cache: Option<bool>,
    /// Skip the client-wide circuit breaker (health probes).
    pub bypass_breaker: bool,
    /// Deadline for the whole call, retries and backoff included.
    pub deadline: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            headers: Vec::new(),
            timeout: None,
            cache: None,
            bypass_breaker: false,
            deadline: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the content type.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| ClientError::InvalidRequest(format!("json body: {}", e)))?;
        Ok(self.header("content-type", "application/json").body(bytes))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn bypass_breaker(mut self) -> Self {
        self.bypass_breaker = true;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cache key: path plus encoded query, endpoint independent.
    pub fn cache_key(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish();
        format!("{}?{}", self.path, query)
    }

    /// Validate and convert the caller's headers.
    pub fn header_map(&self) -> Result<HeaderMap, ClientError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidRequest(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidRequest(format!("header '{}': {}", name, e)))?;
            map.append(name, value);
        }
        Ok(map)
    }
}

/// One concrete attempt, addressed to a selected endpoint.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// ID shared by every attempt of the logical call.
    pub request_id: Uuid,
    /// 1-based attempt number.
    pub attempt: u32,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            attempt: 1,
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

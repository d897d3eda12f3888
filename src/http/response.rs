//! Response model.
//!
//! # Responsibilities
//! - Carry the fully buffered response of the winning attempt
//! - Record where it came from (endpoint, cache) and how long it took
//! - Expose the per-attempt retry history

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::resilience::RetryAttempt;

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Base URL of the endpoint that answered. Empty until the executor fills it.
    pub endpoint: String,
    /// Wall time of the whole call that produced this response.
    pub elapsed: Duration,
    /// One entry per network attempt.
    pub attempts: Vec<RetryAttempt>,
    pub from_cache: bool,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            endpoint: String::new(),
            elapsed: Duration::ZERO,
            attempts: Vec::new(),
            from_cache: false,
        }
    }

    /// 2xx and 3xx. Anything else is a failed attempt to the executor.
    pub fn is_success(&self) -> bool {
        self.status.is_success() || self.status.is_redirection()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

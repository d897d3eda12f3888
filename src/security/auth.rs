//! Bearer token authentication for outbound calls.

use axum::http::{header::AUTHORIZATION, HeaderValue};

use crate::error::ClientError;
use crate::http::interceptors::RequestInterceptor;
use crate::http::request::OutboundRequest;

/// Adds `Authorization: Bearer <token>` unless the request already carries
/// an `Authorization` header.
#[derive(Clone)]
pub struct BearerAuth {
    value: HeaderValue,
}

impl BearerAuth {
    pub fn new(token: &str) -> Result<Self, ClientError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ClientError::InvalidRequest("bearer token is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").field("value", &"<redacted>").finish()
    }
}

impl RequestInterceptor for BearerAuth {
    fn process_request(&self, request: &mut OutboundRequest) {
        if !request.headers.contains_key(AUTHORIZATION) {
            request.headers.insert(AUTHORIZATION, self.value.clone());
        }
    }
}

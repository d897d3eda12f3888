//! Request and response interceptors.
//!
//! Interceptors run sequentially in registration order, once per attempt.
//! Later interceptors see the mutations of earlier ones.

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ClientError;
use crate::http::request::{OutboundRequest, X_REQUEST_ID};
use crate::http::response::Response;

/// Mutates an outbound attempt before it is sent.
pub trait RequestInterceptor: Send + Sync {
    fn process_request(&self, request: &mut OutboundRequest);
}

/// Mutates a response before it is classified.
pub trait ResponseInterceptor: Send + Sync {
    fn process_response(&self, response: &mut Response);
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut OutboundRequest) + Send + Sync,
{
    fn process_request(&self, request: &mut OutboundRequest) {
        self(request)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(&mut Response) + Send + Sync,
{
    fn process_response(&self, response: &mut Response) {
        self(response)
    }
}

/// Adds `x-request-id` from the call's ID unless the caller set one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdInterceptor;

impl RequestInterceptor for RequestIdInterceptor {
    fn process_request(&self, request: &mut OutboundRequest) {
        if request.headers.contains_key(X_REQUEST_ID) {
            return;
        }
        if let Ok(value) = HeaderValue::from_str(&request.request_id.to_string()) {
            request.headers.insert(X_REQUEST_ID, value);
        }
    }
}

/// Static headers from configuration. Never overwrites per-request headers.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    headers: HeaderMap,
}

impl DefaultHeaders {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::with_capacity(map.len());
        for (name, value) in map {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ClientError::InvalidRequest(format!("default header '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClientError::InvalidRequest(format!("default header '{}': {}", name, e))
            })?;
            headers.insert(name, value);
        }
        Ok(Self { headers })
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl RequestInterceptor for DefaultHeaders {
    fn process_request(&self, request: &mut OutboundRequest) {
        for (name, value) in &self.headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn request() -> OutboundRequest {
        OutboundRequest::new(Method::GET, url::Url::parse("http://127.0.0.1:9000/x").unwrap())
    }

    #[test]
    fn test_request_id_added_once() {
        let mut req = request();
        RequestIdInterceptor.process_request(&mut req);
        let id = req.headers[X_REQUEST_ID].clone();
        assert_eq!(id.to_str().unwrap(), req.request_id.to_string());

        req.headers.insert(X_REQUEST_ID, HeaderValue::from_static("caller-id"));
        RequestIdInterceptor.process_request(&mut req);
        assert_eq!(req.headers[X_REQUEST_ID], "caller-id");
    }

    #[test]
    fn test_default_headers_do_not_overwrite() {
        let mut map = BTreeMap::new();
        map.insert("user-agent".to_string(), "resilient-client".to_string());
        map.insert("x-tenant".to_string(), "default".to_string());
        let defaults = DefaultHeaders::from_map(&map).unwrap();

        let mut req = request();
        req.headers.insert("x-tenant", HeaderValue::from_static("acme"));
        defaults.process_request(&mut req);
        assert_eq!(req.headers["x-tenant"], "acme");
        assert_eq!(req.headers["user-agent"], "resilient-client");
    }

    #[test]
    fn test_closures_are_interceptors() {
        let tag = |req: &mut OutboundRequest| {
            req.headers.insert("x-tag", HeaderValue::from_static("1"));
        };
        let mut req = request();
        tag.process_request(&mut req);
        assert!(req.headers.contains_key("x-tag"));
    }

    #[test]
    fn test_bad_default_header_rejected() {
        let mut map = BTreeMap::new();
        map.insert("bad name".to_string(), "v".to_string());
        assert!(DefaultHeaders::from_map(&map).is_err());
    }
}

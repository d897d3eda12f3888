//! Resilient HTTP service client.
//!
//! Spreads requests over a pool of interchangeable endpoints and keeps
//! working through endpoint failures: retries with backoff, a circuit
//! breaker, client-side rate limiting, a GET response cache and a
//! background health monitor that pulls failing endpoints out of rotation.

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ErrorCategory, TransportError};
pub use http::{RequestSpec, Response, ServiceClient, ServiceClientBuilder, Transport};
pub use lifecycle::Shutdown;
pub use load_balancer::{LoadBalancer, ServiceEndpoint, Strategy};
pub use resilience::{CircuitBreaker, CircuitState, RetryPolicy};

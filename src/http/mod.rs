//! HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceClient::execute(RequestSpec)
//!     → executor.rs
//!         → rate limiter → cache lookup → circuit breaker
//!         → for each attempt:
//!             → LoadBalancer::select_endpoint
//!             → request.rs (OutboundRequest for the chosen endpoint)
//!             → interceptors.rs (request pipeline, in order)
//!             → transport.rs (send with per-attempt timeout)
//!             → interceptors.rs (response pipeline, in order)
//!             → classify: success / retry after backoff / give up
//!     → response.rs (buffered Response with attempt history)
//! ```
//!
//! # Design Decisions
//! - The transport is a trait so every layer above it is testable in-process
//! - The facade (client.rs) only assembles; behaviour lives in the executor

pub mod client;
pub mod executor;
pub mod interceptors;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{HealthReport, ServiceClient, ServiceClientBuilder};
pub use executor::RequestExecutor;
pub use interceptors::{DefaultHeaders, RequestIdInterceptor, RequestInterceptor, ResponseInterceptor};
pub use request::{OutboundRequest, RequestSpec, X_REQUEST_ID};
pub use response::Response;
pub use transport::{HyperTransport, Transport};

//! Error taxonomy for outbound calls.
//!
//! # Categories
//! - Transport errors: connect failure, timeout, network error. Always
//!   classified against the retry policy's retryable-error set.
//! - Status errors: non-success responses. Retryable only when the status is
//!   in the retryable-status set.
//! - Exhaustion: retries used up or breaker open. Terminal, and carries the
//!   last concrete error when one was observed.
//! - Capacity: no healthy endpoints. Terminal, no network attempt was made.

use std::time::Duration;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse category of a transport failure, as matched by retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection could not be established (refused, DNS, unreachable).
    Connect,
    /// The attempt exceeded its timeout.
    Timeout,
    /// Any other I/O or protocol failure after connecting.
    Network,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Connect => "connect",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
        };
        f.write_str(name)
    }
}

/// Failure raised by a [`Transport`](crate::http::transport::Transport).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    /// The request could not be built. Never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Category used for retry classification. `None` for errors that are
    /// never worth retrying.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            TransportError::Connect(_) => Some(ErrorCategory::Connect),
            TransportError::Timeout(_) => Some(ErrorCategory::Timeout),
            TransportError::Network(_) => Some(ErrorCategory::Network),
            TransportError::InvalidRequest(_) => None,
        }
    }
}

/// Terminal error surfaced to callers of the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The registry had no available endpoint. No network call was made.
    #[error("no healthy endpoints available")]
    NoHealthyEndpoints,

    /// The client-wide circuit breaker rejected the call.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Last attempt ended with a non-success status.
    #[error("request to {endpoint} failed with status {status} after {attempts} attempt(s)")]
    Status {
        status: u16,
        endpoint: String,
        attempts: u32,
        body: Bytes,
    },

    /// Last attempt ended with a transport failure.
    #[error("request to {endpoint} failed after {attempts} attempt(s): {source}")]
    Transport {
        endpoint: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The caller-supplied deadline for the whole call elapsed.
    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Only used when no concrete error was ever captured.
    #[error("retries exhausted after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Client configuration failed semantic validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Number of network attempts made before this error was raised.
    pub fn attempts(&self) -> u32 {
        match self {
            ClientError::Status { attempts, .. }
            | ClientError::Transport { attempts, .. }
            | ClientError::RetriesExhausted { attempts } => *attempts,
            _ => 0,
        }
    }

    /// HTTP status of the last attempt, if it produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Endpoint of the last attempt, if any was made.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ClientError::Status { endpoint, .. } | ClientError::Transport { endpoint, .. } => {
                Some(endpoint)
            }
            _ => None,
        }
    }
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

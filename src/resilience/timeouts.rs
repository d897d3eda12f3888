//! Timeout enforcement.
//!
//! # Responsibilities
//! - Pick the effective per-attempt timeout
//! - Bound a whole logical call by a caller deadline
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; expiry drops the inner future, so
//!   RAII guards held by it still run their cleanup
//! - Deadline expiry is distinct from a per-attempt timeout

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

/// Per-request override wins over the configured default.
pub fn effective_timeout(override_timeout: Option<Duration>, default: Duration) -> Duration {
    override_timeout.unwrap_or(default)
}

/// Run `fut` under an optional deadline.
pub async fn with_deadline<F, T>(deadline: Option<Duration>, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(deadline = ?limit, "Request deadline exceeded, call aborted");
                Err(ClientError::DeadlineExceeded(limit))
            }
        },
        None => fut.await,
    }
}

//! Client-side token bucket rate limiting.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// A token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, capacity: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;
    }
}

/// Admits up to `burst_size` calls at once and `requests_per_second` in the
/// steady state.
///
/// `acquire` suspends the caller instead of rejecting. The bucket lock is
/// held across that wait, so waiters are admitted in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_second: f64,
    burst_size: f64,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Create a limiter with a full bucket.
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        let burst_size = f64::from(burst_size.max(1));
        Self {
            requests_per_second,
            burst_size,
            bucket: Mutex::new(TokenBucket {
                tokens: burst_size,
                last_refill: Instant::now(),
            }),
        }
    }

    /// `None` when rate limiting is disabled.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.requests_per_second, config.burst_size))
    }

    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    pub fn burst_size(&self) -> f64 {
        self.burst_size
    }

    /// Take one token, waiting for it if the bucket is empty.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.burst_size, self.requests_per_second);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return;
        }

        let wait = (1.0 - bucket.tokens) / self.requests_per_second;
        let wait = Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX);
        tracing::debug!(wait = ?wait, "Rate limit reached, delaying request");
        metrics::counter!("client_rate_limited_total").increment(1);
        tokio::time::sleep(wait).await;

        // The waiter consumes the budget it waited for.
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }

    /// Take one token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let Ok(mut bucket) = self.bucket.try_lock() else {
            // Someone is already waiting for the next token.
            return false;
        };
        bucket.refill(self.burst_size, self.requests_per_second);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket, refilled to now.
    pub async fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.burst_size, self.requests_per_second);
        bucket.tokens
    }
}

//! Insertion-ordered response cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use axum::http::Method;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::http::response::Response;

/// A cached response plus the time it was stored.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: Response,
    pub stored_at: Instant,
}

impl CachedResponse {
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Advisory: the cache itself never drops stale entries.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CachedResponse>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

/// Cache for successful GET responses.
///
/// Eviction is by insertion order, not access order: when full, storing a
/// new key drops the key that was inserted first, however recently it was
/// read. Overwriting an existing key keeps its original position.
#[derive(Debug)]
pub struct ResponseCache {
    max_size: usize,
    ttl: Duration,
    entries: Mutex<Entries>,
}

impl ResponseCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.max_size, Duration::from_secs(config.ttl_secs)))
    }

    /// Configured freshness horizon, for callers that want to honour it.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Lookup. Only GET is ever cached.
    pub fn get(&self, method: &Method, url: &str) -> Option<CachedResponse> {
        if method != Method::GET {
            return None;
        }
        self.lock().map.get(url).cloned()
    }

    pub fn set(&self, method: &Method, url: &str, response: Response) {
        if method != Method::GET {
            return;
        }
        let mut entries = self.lock();
        if !entries.map.contains_key(url) {
            if entries.map.len() >= self.max_size {
                if let Some(oldest) = entries.order.pop_front() {
                    entries.map.remove(&oldest);
                    tracing::debug!(key = %oldest, "Cache full, evicted oldest entry");
                }
            }
            entries.order.push_back(url.to_string());
        }
        entries.map.insert(
            url.to_string(),
            CachedResponse {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, method: &Method, url: &str) -> bool {
        if method != Method::GET {
            return false;
        }
        let mut entries = self.lock();
        if entries.map.remove(url).is_none() {
            return false;
        }
        entries.order.retain(|key| key != url);
        true
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().expect("response cache mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};

    fn response(body: &'static str) -> Response {
        Response::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_evicts_first_inserted() {
        let cache = ResponseCache::new(3, Duration::from_secs(300));
        cache.set(&Method::GET, "/a", response("a"));
        cache.set(&Method::GET, "/b", response("b"));
        cache.set(&Method::GET, "/c", response("c"));

        // Reading /a does not protect it: this is not LRU.
        assert!(cache.get(&Method::GET, "/a").is_some());
        cache.set(&Method::GET, "/d", response("d"));

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&Method::GET, "/a").is_none());
        for key in ["/b", "/c", "/d"] {
            assert!(cache.get(&Method::GET, key).is_some(), "{} evicted", key);
        }
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let cache = ResponseCache::new(2, Duration::from_secs(300));
        cache.set(&Method::GET, "/a", response("a1"));
        cache.set(&Method::GET, "/b", response("b"));
        cache.set(&Method::GET, "/a", response("a2"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&Method::GET, "/a").unwrap().response.text(), "a2");

        cache.set(&Method::GET, "/c", response("c"));
        assert!(cache.get(&Method::GET, "/a").is_none());
        assert!(cache.get(&Method::GET, "/b").is_some());
    }

    #[test]
    fn test_get_only() {
        let cache = ResponseCache::new(10, Duration::from_secs(300));
        cache.set(&Method::POST, "/a", response("a"));
        assert!(cache.is_empty());
        cache.set(&Method::GET, "/a", response("a"));
        assert!(cache.get(&Method::POST, "/a").is_none());
        assert!(cache.get(&Method::GET, "/a").is_some());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ResponseCache::new(10, Duration::from_secs(300));
        cache.set(&Method::GET, "/a", response("a"));
        cache.set(&Method::GET, "/b", response("b"));
        assert!(cache.invalidate(&Method::GET, "/a"));
        assert!(!cache.invalidate(&Method::GET, "/a"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_is_advisory() {
        let cache = ResponseCache::new(10, Duration::from_secs(5));
        cache.set(&Method::GET, "/a", response("a"));
        tokio::time::advance(Duration::from_secs(10)).await;

        let entry = cache.get(&Method::GET, "/a").expect("stale entries are still served");
        assert!(entry.age() >= Duration::from_secs(10));
        assert!(entry.is_stale(cache.ttl()));
    }
}

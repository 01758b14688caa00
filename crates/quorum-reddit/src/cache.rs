use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use quorum_core::types::RedditResponse;
use tokio::sync::Mutex;

struct Entry {
    value: RedditResponse,
    inserted_at: Instant,
}

/// Response cache keyed by the normalized search request. Bounded by
/// entry count (LRU eviction); a TTL is checked on read, so an expired
/// entry is treated as a miss rather than evicted eagerly.
pub struct ResponseCache {
    ttl: Duration,
    inner: Mutex<LruCache<String, Entry>>,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            ttl,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<RedditResponse> {
        let mut cache = self.inner.lock().await;
        let fresh = matches!(cache.peek(key), Some(entry) if entry.inserted_at.elapsed() < self.ttl);
        if fresh {
            cache.get(key).map(|e| e.value.clone())
        } else {
            cache.pop(key);
            None
        }
    }

    pub async fn put(&self, key: String, value: RedditResponse) {
        let mut cache = self.inner.lock().await;
        cache.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RedditResponse {
        RedditResponse {
            markdown: "hi".to_string(),
            found_count: 1,
            sources: vec![],
            query: "q".to_string(),
            processing_time_ms: 1,
        }
    }

    #[tokio::test]
    async fn caches_and_expires() {
        let cache = ResponseCache::new(4, Duration::from_millis(30));
        cache.put("k".to_string(), sample()).await;
        assert!(cache.get("k").await.is_some());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn evicts_least_recently_used_past_capacity() {
        let cache = ResponseCache::new(1, Duration::from_secs(60));
        cache.put("a".to_string(), sample()).await;
        cache.put("b".to_string(), sample()).await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }
}

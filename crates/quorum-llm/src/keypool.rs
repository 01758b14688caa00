use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Process-wide, lock-free key rotation for a single provider.
///
/// Rotation on 429 is a plain atomic increment (compare-and-swap semantics
/// come for free from `fetch_add`'s total ordering); per-key cooldowns live
/// in a `DashMap` so a key that just hit quota is skipped by the next
/// caller without blocking anyone.
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
    cooldowns: DashMap<usize, Instant>,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
            cooldowns: DashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the next usable key, skipping any still cooling down. `None`
    /// means every key in the pool is currently exhausted.
    pub fn next_key(&self) -> Option<(usize, &str)> {
        let len = self.keys.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            if let Some(until) = self.cooldowns.get(&idx) {
                if Instant::now() < *until {
                    continue;
                }
            }
            return Some((idx, self.keys[idx].as_str()));
        }
        None
    }

    /// Mark a key exhausted for `cooldown`, typically the provider's
    /// `Retry-After` value.
    pub fn mark_exhausted(&self, idx: usize, cooldown: Duration) {
        self.cooldowns.insert(idx, Instant::now() + cooldown);
    }

    pub fn all_exhausted(&self) -> bool {
        if self.keys.is_empty() {
            return true;
        }
        (0..self.keys.len()).all(|idx| {
            self.cooldowns
                .get(&idx)
                .map(|until| Instant::now() < *until)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_across_keys() {
        let pool = KeyPool::new(vec!["a".into(), "b".into(), "c".into()]);
        let (idx1, _) = pool.next_key().unwrap();
        let (idx2, _) = pool.next_key().unwrap();
        assert_ne!(idx1, idx2);
    }

    #[test]
    fn skips_cooling_down_keys() {
        let pool = KeyPool::new(vec!["a".into(), "b".into()]);
        let (idx, _) = pool.next_key().unwrap();
        pool.mark_exhausted(idx, Duration::from_secs(60));
        for _ in 0..4 {
            let (got, _) = pool.next_key().unwrap();
            assert_ne!(got, idx);
        }
    }

    #[test]
    fn all_exhausted_when_every_key_cooling() {
        let pool = KeyPool::new(vec!["a".into()]);
        assert!(!pool.all_exhausted());
        pool.mark_exhausted(0, Duration::from_secs(60));
        assert!(pool.all_exhausted());
    }
}

//! Bounded response cache with a fixed time-to-live
//!
//! An entry is served only while its age is strictly below the TTL. A zero
//! TTL turns the cache off. When full, expired entries are purged first and
//! then the oldest insertion is evicted.
//!
//! Insertion order lives in a queue next to the map, so purging and
//! eviction only touch the entries they remove. Records left behind by
//! re-inserted or removed keys are skipped when they reach the front.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<K, Entry<V>>,
    order: VecDeque<(K, Instant)>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero() && self.capacity > 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) < self.ttl
    }

    /// Fresh value for `key`; a stale entry is dropped on the way
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let fresh = self.is_fresh(self.entries.get(key)?, now);
        if fresh {
            self.entries.get(key).map(|e| e.value.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }

        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.purge_expired();
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }

        let inserted_at = Instant::now();
        self.order.push_back((key.clone(), inserted_at));
        self.entries.insert(key, Entry { value, inserted_at });

        if self.order.len() > self.capacity.saturating_mul(2) {
            self.compact();
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Entries held, including any not yet purged after expiring
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn purge_expired(&mut self) {
        let now = Instant::now();
        while let Some((_, inserted_at)) = self.order.front() {
            if now.duration_since(*inserted_at) < self.ttl {
                break;
            }
            if let Some((key, inserted_at)) = self.order.pop_front() {
                self.remove_if_current(&key, inserted_at);
            }
        }
    }

    fn evict_oldest(&mut self) {
        while let Some((key, inserted_at)) = self.order.pop_front() {
            if self.remove_if_current(&key, inserted_at) {
                return;
            }
        }
    }

    /// Remove `key` only if `inserted_at` is its live record
    fn remove_if_current(&mut self, key: &K, inserted_at: Instant) -> bool {
        let current = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.inserted_at == inserted_at);
        if current {
            self.entries.remove(key);
        }
        current
    }

    /// Drop queue records that no longer match a live entry
    fn compact(&mut self) {
        let entries = &self.entries;
        self.order.retain(|(key, inserted_at)| {
            entries
                .get(key)
                .is_some_and(|entry| entry.inserted_at == *inserted_at)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_served_strictly_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(10), 16);
        cache.insert("a", 1);

        advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.get(&"a"), Some(1));

        advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_disables() {
        let mut cache = TtlCache::new(Duration::ZERO, 16);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes() {
        let mut cache = TtlCache::new(Duration::from_secs(10), 16);
        cache.insert("a", 1);
        advance(Duration::from_secs(8)).await;
        cache.insert("a", 2);
        advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_expired_then_oldest() {
        let mut cache = TtlCache::new(Duration::from_secs(10), 3);
        cache.insert("old", 0);
        advance(Duration::from_secs(11)).await;
        cache.insert("b", 1);
        advance(Duration::from_secs(1)).await;
        cache.insert("c", 2);

        // "old" has expired and goes first
        cache.insert("d", 3);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"old"), None);
        assert_eq!(cache.get(&"b"), Some(1));

        // Nothing expired: the oldest insertion is evicted
        advance(Duration::from_secs(1)).await;
        cache.insert("e", 4);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(2));
        assert_eq!(cache.get(&"e"), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinserted_key_is_not_the_oldest() {
        let mut cache = TtlCache::new(Duration::from_secs(10), 3);
        cache.insert("a", 1);
        advance(Duration::from_millis(10)).await;
        cache.insert("b", 2);
        advance(Duration::from_millis(10)).await;
        cache.insert("c", 3);
        advance(Duration::from_millis(10)).await;
        cache.insert("a", 4);
        advance(Duration::from_millis(10)).await;

        cache.insert("d", 5);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(4));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"d"), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_churn_keeps_order_queue_bounded() {
        let mut cache = TtlCache::new(Duration::from_secs(10), 4);
        for round in 0..100 {
            cache.insert(round % 3, round);
            cache.remove(&((round + 1) % 3));
            advance(Duration::from_millis(1)).await;
        }
        assert!(cache.order.len() <= 8);
        assert!(cache.len() <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_clear() {
        let mut cache = TtlCache::new(Duration::from_secs(10), 4);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.get(&"a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }
}

//! Injected memoization for fixed-lag correlations.
//!
//! The engine never caches on its own; callers that re-run analyses over the
//! same snapshot can hand a [`CorrelationCache`] to
//! [`CorrelationEngine::with_cache`](crate::engine::CorrelationEngine::with_cache).
//! Entries are only valid for the snapshot they were computed from.

use crate::correlation::LagCandidate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Cache key: series A's id, series B's id, and the lag applied to A.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub metric_a: String,
    pub metric_b: String,
    pub lag: i32,
}

impl PairKey {
    pub fn new(metric_a: &str, metric_b: &str, lag: i32) -> Self {
        Self {
            metric_a: metric_a.to_string(),
            metric_b: metric_b.to_string(),
            lag,
        }
    }
}

pub trait CorrelationCache: Send + Sync {
    fn get(&self, key: &PairKey) -> Option<LagCandidate>;
    fn insert(&self, key: PairKey, candidate: LagCandidate);
}

/// Concurrent in-process cache backed by `DashMap`.
pub struct InMemoryCorrelationCache {
    entries: DashMap<PairKey, LagCandidate>,
}

impl InMemoryCorrelationCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries, e.g. when the underlying snapshot changes.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for InMemoryCorrelationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationCache for InMemoryCorrelationCache {
    fn get(&self, key: &PairKey) -> Option<LagCandidate> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    fn insert(&self, key: PairKey, candidate: LagCandidate) {
        self.entries.insert(key, candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(lag: i32, r: f64) -> LagCandidate {
        LagCandidate {
            lag,
            r,
            n: 12,
            degenerate: false,
            cosine_similarity: 0.9,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = InMemoryCorrelationCache::new();
        assert!(cache.is_empty());

        cache.insert(PairKey::new("mrr", "ad_spend", 2), candidate(2, 0.81));

        let hit = cache.get(&PairKey::new("mrr", "ad_spend", 2)).unwrap();
        assert_eq!(hit.lag, 2);
        assert!((hit.r - 0.81).abs() < f64::EPSILON);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_directional() {
        let cache = InMemoryCorrelationCache::new();
        cache.insert(PairKey::new("a", "b", 1), candidate(1, 0.5));

        assert!(cache.get(&PairKey::new("b", "a", 1)).is_none());
        assert!(cache.get(&PairKey::new("a", "b", -1)).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = InMemoryCorrelationCache::new();
        cache.insert(PairKey::new("a", "b", 0), candidate(0, 0.1));
        cache.clear();
        assert!(cache.is_empty());
    }
}

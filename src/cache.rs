// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Engine-level cache of compiled expressions keyed by source text

use crate::engine::CompiledExpression;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Expression cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionCacheConfig {
    /// Maximum number of cached expressions
    pub max_entries: usize,
    /// Whether compiled expressions are cached at all
    pub enabled: bool,
}

impl ExpressionCacheConfig {
    /// Create a configuration with custom settings
    pub fn new(max_entries: usize, enabled: bool) -> Self {
        Self {
            max_entries,
            enabled,
        }
    }

    /// Create a configuration optimized for high performance
    pub fn high_performance() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }

    /// Create a configuration with caching disabled
    pub fn disabled() -> Self {
        Self {
            max_entries: 0,
            enabled: false,
        }
    }

    /// Create a small configuration for testing eviction
    pub fn testing() -> Self {
        Self {
            max_entries: 4,
            enabled: true,
        }
    }
}

impl Default for ExpressionCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            enabled: true,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    expression: CompiledExpression,
    last_accessed: AtomicU64,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries currently cached
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0, or 0.0 if no lookup happened
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Concurrent text → compiled expression cache with least-recently-used eviction
#[derive(Debug)]
pub struct ExpressionCache {
    entries: DashMap<String, CacheEntry>,
    config: ExpressionCacheConfig,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ExpressionCache {
    /// Create a cache with the given configuration
    pub fn new(config: ExpressionCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &ExpressionCacheConfig {
        &self.config
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Cached expression for `text`
    pub fn get(&self, text: &str) -> Option<CompiledExpression> {
        if !self.config.enabled {
            return None;
        }
        match self.entries.get(text) {
            Some(entry) => {
                entry.last_accessed.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::trace!("Expression cache hit for '{text}'");
                Some(entry.expression.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a compiled expression, evicting the least recently used entry when full
    pub fn insert(&self, text: &str, expression: CompiledExpression) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }
        if !self.entries.contains_key(text) {
            while self.entries.len() >= self.config.max_entries {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }
        self.entries.insert(
            text.to_string(),
            CacheEntry {
                expression,
                last_accessed: AtomicU64::new(self.tick()),
            },
        );
    }

    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_accessed.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest.and_then(|key| self.entries.remove(&key)) {
            Some((key, _)) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                log::debug!("Evicted '{key}' from the expression cache");
                true
            }
            None => false,
        }
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Number of cached expressions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new(ExpressionCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MathEngine;

    fn compiled(text: &str) -> CompiledExpression {
        MathEngine::new().compile(text).unwrap()
    }

    #[test]
    fn test_config_presets() {
        assert_eq!(ExpressionCacheConfig::default().max_entries, 1_000);
        assert_eq!(ExpressionCacheConfig::high_performance().max_entries, 10_000);
        assert!(!ExpressionCacheConfig::disabled().enabled);
        assert_eq!(ExpressionCacheConfig::testing().max_entries, 4);
    }

    #[test]
    fn test_hits_and_misses() {
        let cache = ExpressionCache::default();
        assert!(cache.get("a + 1").is_none());
        cache.insert("a + 1", compiled("a + 1"));
        assert!(cache.get("a + 1").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = ExpressionCache::new(ExpressionCacheConfig::new(2, true));
        cache.insert("a", compiled("a"));
        cache.insert("b", compiled("b"));
        assert!(cache.get("a").is_some());
        cache.insert("c", compiled("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = ExpressionCache::new(ExpressionCacheConfig::disabled());
        cache.insert("a", compiled("a"));
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }
}

//! Result cache for resolved keys.
//!
//! The loader consults the cache before joining a batch and writes every
//! successfully fetched value into it. The cache has pure map semantics:
//! no TTL and no capacity bound. Entries live until they are explicitly
//! deleted or the cache is cleared.
//!
//! # Thread Safety
//!
//! Implementations are synchronized independently of the loader's batch
//! state, so lookups never contend with batch accumulation.
//!
//! # Example
//!
//! ```rust,ignore
//! use rsload_domain::cache::{MemoryCache, ResultCache};
//!
//! let cache = MemoryCache::new();
//! cache.put("user:1".to_string(), 42);
//!
//! assert_eq!(cache.get(&"user:1".to_string()), Some(42));
//! ```

use dashmap::DashMap;
use std::hash::Hash;

/// A concurrent key/value store for resolved results.
///
/// Supply your own implementation to share resolved values between
/// loaders, or use [`MemoryCache`].
pub trait ResultCache<K, V>: Send + Sync {
    /// Returns a copy of the cached value, if present.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores a value, replacing any previous entry.
    fn put(&self, key: K, value: V);

    /// Removes a single entry.
    fn delete(&self, key: &K);

    /// Removes all entries.
    fn clear(&self);

    /// Returns the number of cached entries.
    fn len(&self) -> usize;

    /// Returns true if nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`ResultCache`] backed by DashMap.
///
/// This type does not implement `Clone`; share it through `Arc`.
pub struct MemoryCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

impl<K, V> ResultCache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_cache_creation_and_initial_state() {
        // Arrange & Act
        let cache: MemoryCache<String, u32> = MemoryCache::new();

        // Assert
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a")), None);
    }

    #[test]
    fn test_put_then_get_returns_value() {
        // Arrange
        let cache = MemoryCache::new();

        // Act
        cache.put(key("a"), 1u32);

        // Assert
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let cache = MemoryCache::new();
        cache.put(key("a"), 1u32);

        cache.put(key("a"), 2);

        assert_eq!(cache.get(&key("a")), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_delete_removes_only_that_key() {
        // Arrange
        let cache = MemoryCache::new();
        cache.put(key("a"), 1u32);
        cache.put(key("b"), 2);

        // Act
        cache.delete(&key("a"));

        // Assert
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.get(&key("b")), Some(2));
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let cache: MemoryCache<String, u32> = MemoryCache::new();

        cache.delete(&key("missing"));

        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_removes_all_entries() {
        // Arrange
        let cache = MemoryCache::new();
        for i in 0..10u32 {
            cache.put(format!("k{i}"), i);
        }

        // Act
        cache.clear();

        // Assert
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("k3")), None);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        // Arrange
        let cache: Arc<MemoryCache<String, usize>> = Arc::new(MemoryCache::new());

        // Act - 8 threads each write 100 distinct keys while reading others
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.put(format!("t{t}-{i}"), i);
                        let _ = cache.get(&format!("t{}-{}", (t + 1) % 8, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Assert
        assert_eq!(cache.len(), 800);
        assert_eq!(cache.get(&key("t3-42")), Some(42));
    }

    #[test]
    fn test_usable_as_trait_object() {
        let cache: Arc<dyn ResultCache<String, u32>> =
            Arc::new(MemoryCache::<String, u32>::new());

        cache.put(key("a"), 7);

        assert_eq!(cache.get(&key("a")), Some(7));
    }
}

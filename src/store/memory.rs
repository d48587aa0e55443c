//! Volatile in-memory cache backend.

use dashmap::DashMap;

use super::Cache;

/// A [`Cache`] that stores entries in a concurrent in-memory map.
///
/// Contents are lost when the process exits. Entries are never evicted; use
/// [`MokaCache`](super::MokaCache) when a bound is needed.
///
/// # Examples
///
/// ```
/// use httpcache::store::{Cache, MemoryCache};
///
/// let cache = MemoryCache::new();
/// cache.put("key", b"value".to_vec());
/// assert_eq!(cache.get("key"), Some(b"value".to_vec()));
/// cache.delete("key");
/// assert_eq!(cache.get("key"), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryCache {
    /// Creates an empty in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("missing"), None);

        cache.put("a", b"1".to_vec());
        cache.put("b", b"2".to_vec());
        assert_eq!(cache.get("a"), Some(b"1".to_vec()));
        assert_eq!(cache.len(), 2);

        cache.put("a", b"replaced".to_vec());
        assert_eq!(cache.get("a"), Some(b"replaced".to_vec()));

        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("k{}-{}", i, j);
                        cache.put(&key, vec![i as u8]);
                        assert_eq!(cache.get(&key), Some(vec![i as u8]));
                        cache.delete(&key);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.is_empty());
    }
}

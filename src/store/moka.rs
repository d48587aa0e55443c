//! Bounded high-throughput cache backend.

use moka::sync::{Cache as MokaInner, CacheBuilder};

use super::Cache;

/// A [`Cache`] backed by [`moka`]'s concurrent TinyLFU cache.
///
/// Suitable for high-throughput processes with many threads hitting the cache
/// concurrently. The cache is bounded by total stored bytes; when full, moka's
/// probabilistic admission policy may evict colder entries or decline to admit
/// a new one.
///
/// # Examples
///
/// ```
/// use httpcache::store::{Cache, MokaCache};
///
/// let cache = MokaCache::with_max_capacity(64 * 1024 * 1024); // 64 MiB
/// cache.put("key", b"value".to_vec());
/// ```
pub struct MokaCache {
    inner: MokaInner<String, Vec<u8>>,
}

impl MokaCache {
    /// Creates a cache bounded to approximately `max_bytes` of stored values.
    pub fn with_max_capacity(max_bytes: u64) -> Self {
        let inner = CacheBuilder::new(max_bytes)
            .weigher(|key: &String, value: &Vec<u8>| {
                (key.len() + value.len()).try_into().unwrap_or(u32::MAX)
            })
            .build();
        Self { inner }
    }

    /// Blocks until pending internal maintenance has been applied, making
    /// recent writes visible to subsequent reads. Only needed in tests and
    /// benchmarks; regular use tolerates the write buffering.
    pub fn sync(&self) {
        self.inner.run_pending_tasks();
    }
}

impl Cache for MokaCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: Vec<u8>) {
        self.inner.insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) {
        self.inner.invalidate(key);
    }
}
